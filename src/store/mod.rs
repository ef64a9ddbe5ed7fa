//! Persistence behind a single trait. The backend is chosen once at startup
//! and handlers only ever see `Arc<dyn BookingStore>`.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::config::{Config, StoreBackend};
use crate::error::AppError;
use crate::models::booking::{Booking, BookingStatus};
use crate::models::driver::Driver;
use crate::models::promo::PromoCode;
use crate::pricing::format_cents;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait BookingStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn insert_booking(&self, booking: Booking) -> Result<Booking, AppError>;

    /// Inserts a booking and redeems the promo code it was priced with. If
    /// either half fails, neither is kept.
    async fn insert_booking_with_promo(
        &self,
        booking: Booking,
        promo_id: Uuid,
    ) -> Result<Booking, AppError> {
        let booking = self.insert_booking(booking).await?;
        if let Err(err) = self.redeem_promo(promo_id).await {
            self.delete_booking(booking.id).await?;
            return Err(err);
        }
        Ok(booking)
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, AppError>;

    /// Newest first.
    async fn list_bookings(&self, status: Option<BookingStatus>) -> Result<Vec<Booking>, AppError>;

    async fn bookings_for_date(&self, date: NaiveDate) -> Result<Vec<Booking>, AppError>;

    /// Applies a lifecycle transition. Rejects illegal transitions with
    /// `Conflict` and unknown ids with `NotFound`.
    async fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking, AppError>;

    /// Rejects terminal bookings with `Conflict`.
    async fn assign_driver(&self, id: Uuid, driver_id: Uuid) -> Result<Booking, AppError>;

    async fn delete_booking(&self, id: Uuid) -> Result<bool, AppError>;

    async fn booking_stats(&self) -> Result<BookingStats, AppError>;

    async fn insert_driver(&self, driver: Driver) -> Result<Driver, AppError>;

    async fn get_driver(&self, id: Uuid) -> Result<Option<Driver>, AppError>;

    async fn list_drivers(&self) -> Result<Vec<Driver>, AppError>;

    async fn driver_bookings(
        &self,
        driver_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, AppError>;

    /// Codes are unique; a duplicate is a `Conflict`.
    async fn insert_promo(&self, promo: PromoCode) -> Result<PromoCode, AppError>;

    /// Looks up an already upper-cased code.
    async fn find_promo(&self, code: &str) -> Result<Option<PromoCode>, AppError>;

    /// Newest first.
    async fn list_promos(&self) -> Result<Vec<PromoCode>, AppError>;

    async fn deactivate_promo(&self, id: Uuid) -> Result<PromoCode, AppError>;

    /// Atomically bumps `used_count`, refusing inactive or exhausted codes.
    async fn redeem_promo(&self, id: Uuid) -> Result<PromoCode, AppError>;
}

pub async fn connect(config: &Config) -> Result<Arc<dyn BookingStore>, AppError> {
    let store: Arc<dyn BookingStore> = match config.store_backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Sqlite => Arc::new(SqliteStore::connect(&config.database_url).await?),
    };
    info!(backend = store.backend(), "booking store ready");
    Ok(store)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub confirmed: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub cancelled: u64,
    /// Over non-cancelled bookings.
    pub revenue: u64,
    /// Over non-cancelled bookings.
    pub bags: u64,
}

impl StatusCounts {
    pub fn record(&mut self, booking: &Booking) {
        match booking.status {
            BookingStatus::Pending => self.pending += 1,
            BookingStatus::Confirmed => self.confirmed += 1,
            BookingStatus::InProgress => self.in_progress += 1,
            BookingStatus::Completed => self.completed += 1,
            BookingStatus::Cancelled => self.cancelled += 1,
        }
        if booking.status != BookingStatus::Cancelled {
            self.revenue += booking.total_price;
            self.bags += u64::from(booking.number_of_bags);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingStats {
    pub total: u64,
    pub pending: u64,
    pub confirmed: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub total_revenue: u64,
    pub total_revenue_dollars: String,
    pub average_order_value: u64,
    pub average_order_value_dollars: String,
    pub total_bags: u64,
}

impl From<StatusCounts> for BookingStats {
    fn from(counts: StatusCounts) -> Self {
        let total = counts.pending
            + counts.confirmed
            + counts.in_progress
            + counts.completed
            + counts.cancelled;
        let billable = total - counts.cancelled;
        let average_order_value = if billable == 0 {
            0
        } else {
            (counts.revenue + billable / 2) / billable
        };

        Self {
            total,
            pending: counts.pending,
            confirmed: counts.confirmed,
            in_progress: counts.in_progress,
            completed: counts.completed,
            cancelled: counts.cancelled,
            total_revenue: counts.revenue,
            total_revenue_dollars: format_cents(counts.revenue),
            average_order_value,
            average_order_value_dollars: format_cents(average_order_value),
            total_bags: counts.bags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_exclude_cancelled_from_revenue() {
        let counts = StatusCounts {
            pending: 1,
            confirmed: 1,
            cancelled: 1,
            revenue: 9_601,
            bags: 3,
            ..StatusCounts::default()
        };
        let stats = BookingStats::from(counts);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.total_revenue_dollars, "$96.01");
        assert_eq!(stats.average_order_value, 4_801);
        assert_eq!(stats.total_bags, 3);
    }

    #[test]
    fn empty_stats_are_zero() {
        let stats = BookingStats::from(StatusCounts::default());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_order_value, 0);
        assert_eq!(stats.average_order_value_dollars, "$0.00");
    }
}
