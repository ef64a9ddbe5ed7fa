use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::booking::{Booking, BookingStatus};
use crate::models::driver::Driver;
use crate::models::promo::PromoCode;
use crate::store::{BookingStats, BookingStore, StatusCounts};

/// Process-local store. Each map entry is locked independently, so status
/// transitions and promo redemptions are check-and-set under the entry lock.
#[derive(Default)]
pub struct MemoryStore {
    bookings: DashMap<Uuid, Booking>,
    drivers: DashMap<Uuid, Driver>,
    promos: DashMap<Uuid, PromoCode>,
    promo_ids_by_code: DashMap<String, Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect_bookings<F>(&self, keep: F) -> Vec<Booking>
    where
        F: Fn(&Booking) -> bool,
    {
        let mut bookings: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings
    }

    fn insert_new(&self, booking: Booking) -> Result<Booking, AppError> {
        match self.bookings.entry(booking.id) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "booking {} already exists",
                booking.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(booking.clone());
                Ok(booking)
            }
        }
    }
}

fn ensure_redeemable(promo: &PromoCode) -> Result<(), AppError> {
    if !promo.active {
        return Err(AppError::Conflict("promo code is no longer active".to_string()));
    }
    if promo.is_exhausted() {
        return Err(AppError::Conflict(
            "promo code has reached maximum uses".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl BookingStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert_booking(&self, booking: Booking) -> Result<Booking, AppError> {
        self.insert_new(booking)
    }

    /// Holds the promo entry lock across the insert, so the booking and the
    /// redemption land together.
    async fn insert_booking_with_promo(
        &self,
        booking: Booking,
        promo_id: Uuid,
    ) -> Result<Booking, AppError> {
        let mut promo = self
            .promos
            .get_mut(&promo_id)
            .ok_or_else(|| AppError::NotFound(format!("promo code {promo_id} not found")))?;
        ensure_redeemable(&promo)?;

        let booking = self.insert_new(booking)?;
        promo.used_count = promo.used_count.saturating_add(1);
        Ok(booking)
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, AppError> {
        Ok(self.bookings.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_bookings(&self, status: Option<BookingStatus>) -> Result<Vec<Booking>, AppError> {
        Ok(self.collect_bookings(|booking| status.is_none_or(|wanted| booking.status == wanted)))
    }

    async fn bookings_for_date(&self, date: NaiveDate) -> Result<Vec<Booking>, AppError> {
        let mut bookings = self.collect_bookings(|booking| booking.pickup_date == date);
        bookings.sort_by_key(|booking| booking.pickup_time);
        Ok(bookings)
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking, AppError> {
        let mut booking = self
            .bookings
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;

        if !booking.status.can_transition_to(status) {
            return Err(AppError::Conflict(format!(
                "cannot move booking from {} to {}",
                booking.status, status
            )));
        }

        booking.status = status;
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn assign_driver(&self, id: Uuid, driver_id: Uuid) -> Result<Booking, AppError> {
        let mut booking = self
            .bookings
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;

        if booking.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "booking is {} and cannot be reassigned",
                booking.status
            )));
        }

        booking.driver_id = Some(driver_id);
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn delete_booking(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.bookings.remove(&id).is_some())
    }

    async fn booking_stats(&self) -> Result<BookingStats, AppError> {
        let mut counts = StatusCounts::default();
        for entry in self.bookings.iter() {
            counts.record(entry.value());
        }
        Ok(counts.into())
    }

    async fn insert_driver(&self, driver: Driver) -> Result<Driver, AppError> {
        self.drivers.insert(driver.id, driver.clone());
        Ok(driver)
    }

    async fn get_driver(&self, id: Uuid) -> Result<Option<Driver>, AppError> {
        Ok(self.drivers.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, AppError> {
        let mut drivers: Vec<Driver> = self
            .drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        drivers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(drivers)
    }

    async fn driver_bookings(
        &self,
        driver_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, AppError> {
        Ok(self.collect_bookings(|booking| {
            booking.driver_id == Some(driver_id)
                && status.is_none_or(|wanted| booking.status == wanted)
        }))
    }

    async fn insert_promo(&self, promo: PromoCode) -> Result<PromoCode, AppError> {
        match self.promo_ids_by_code.entry(promo.code.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "promo code {} already exists",
                promo.code
            ))),
            Entry::Vacant(slot) => {
                slot.insert(promo.id);
                self.promos.insert(promo.id, promo.clone());
                Ok(promo)
            }
        }
    }

    async fn find_promo(&self, code: &str) -> Result<Option<PromoCode>, AppError> {
        let Some(id) = self.promo_ids_by_code.get(code).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.promos.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_promos(&self) -> Result<Vec<PromoCode>, AppError> {
        let mut promos: Vec<PromoCode> = self
            .promos
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        promos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(promos)
    }

    async fn deactivate_promo(&self, id: Uuid) -> Result<PromoCode, AppError> {
        let mut promo = self
            .promos
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("promo code {id} not found")))?;
        promo.active = false;
        Ok(promo.clone())
    }

    async fn redeem_promo(&self, id: Uuid) -> Result<PromoCode, AppError> {
        let mut promo = self
            .promos
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("promo code {id} not found")))?;
        ensure_redeemable(&promo)?;

        promo.used_count = promo.used_count.saturating_add(1);
        Ok(promo.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, Utc};

    use super::*;
    use crate::models::promo::DiscountType;
    use crate::pricing::PricingType;

    fn booking(status: BookingStatus, total_price: u64, age_minutes: i64) -> Booking {
        let now = Utc::now() - Duration::minutes(age_minutes);
        Booking {
            id: Uuid::new_v4(),
            name: "Dana".to_string(),
            phone: "2065550100".to_string(),
            email: "dana@example.com".to_string(),
            address: "1 Pike St, Seattle".to_string(),
            service: "standard".to_string(),
            pickup_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            pickup_time: None,
            pricing_type: PricingType::PerBag,
            number_of_bags: 1,
            items: Vec::new(),
            price_per_bag: Some(total_price),
            subtotal: total_price,
            discount_amount: 0,
            promo_code: None,
            total_price,
            status,
            notes: String::new(),
            driver_id: None,
            location: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn promo(code: &str, max_uses: u32) -> PromoCode {
        PromoCode {
            id: Uuid::new_v4(),
            code: code.to_string(),
            discount_type: DiscountType::Fixed,
            discount_value: 500,
            max_uses,
            used_count: 0,
            expires_at: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn lists_newest_first_with_status_filter() {
        let store = MemoryStore::new();
        let old = store.insert_booking(booking(BookingStatus::Pending, 3200, 30)).await.unwrap();
        let new = store.insert_booking(booking(BookingStatus::Pending, 4200, 1)).await.unwrap();
        store.insert_booking(booking(BookingStatus::Cancelled, 5000, 5)).await.unwrap();

        let pending = store.list_bookings(Some(BookingStatus::Pending)).await.unwrap();
        let ids: Vec<Uuid> = pending.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![new.id, old.id]);
        assert_eq!(store.list_bookings(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn status_update_enforces_lifecycle() {
        let store = MemoryStore::new();
        let created = store.insert_booking(booking(BookingStatus::Pending, 3200, 0)).await.unwrap();

        let err = store
            .update_booking_status(created.id, BookingStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let confirmed = store
            .update_booking_status(created.id, BookingStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let missing = store
            .update_booking_status(Uuid::new_v4(), BookingStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn terminal_bookings_cannot_take_a_driver() {
        let store = MemoryStore::new();
        let done = store.insert_booking(booking(BookingStatus::Completed, 3200, 0)).await.unwrap();
        let err = store.assign_driver(done.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn stats_skip_cancelled_revenue() {
        let store = MemoryStore::new();
        store.insert_booking(booking(BookingStatus::Pending, 3200, 0)).await.unwrap();
        store.insert_booking(booking(BookingStatus::Completed, 6400, 0)).await.unwrap();
        store.insert_booking(booking(BookingStatus::Cancelled, 5000, 0)).await.unwrap();

        let stats = store.booking_stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.total_revenue, 9600);
        assert_eq!(stats.average_order_value, 4800);
        assert_eq!(stats.total_bags, 2);
    }

    #[tokio::test]
    async fn duplicate_promo_codes_conflict() {
        let store = MemoryStore::new();
        store.insert_promo(promo("SAVE20", 0)).await.unwrap();
        let err = store.insert_promo(promo("SAVE20", 0)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.list_promos().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn redemption_stops_at_max_uses() {
        let store = MemoryStore::new();
        let limited = store.insert_promo(promo("ONCE", 1)).await.unwrap();

        let redeemed = store.redeem_promo(limited.id).await.unwrap();
        assert_eq!(redeemed.used_count, 1);

        let err = store.redeem_promo(limited.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn deactivated_promo_cannot_be_redeemed() {
        let store = MemoryStore::new();
        let code = store.insert_promo(promo("GONE", 0)).await.unwrap();
        let deactivated = store.deactivate_promo(code.id).await.unwrap();
        assert!(!deactivated.active);
        assert!(store.redeem_promo(code.id).await.is_err());
        assert!(!store.find_promo("GONE").await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn promo_booking_is_all_or_nothing() {
        let store = MemoryStore::new();
        let code = store.insert_promo(promo("ONCE", 1)).await.unwrap();
        let existing = store.insert_booking(booking(BookingStatus::Pending, 3200, 0)).await.unwrap();

        let err = store
            .insert_booking_with_promo(existing.clone(), code.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.find_promo("ONCE").await.unwrap().unwrap().used_count, 0);

        let fresh = booking(BookingStatus::Pending, 2700, 0);
        store.insert_booking_with_promo(fresh.clone(), code.id).await.unwrap();
        assert!(store.get_booking(fresh.id).await.unwrap().is_some());
        assert_eq!(store.find_promo("ONCE").await.unwrap().unwrap().used_count, 1);

        let late = booking(BookingStatus::Pending, 2700, 0);
        assert!(store.insert_booking_with_promo(late.clone(), code.id).await.is_err());
        assert!(store.get_booking(late.id).await.unwrap().is_none());
    }
}
