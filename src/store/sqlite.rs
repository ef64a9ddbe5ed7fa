use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::booking::{Booking, BookingStatus};
use crate::models::driver::Driver;
use crate::models::promo::{DiscountType, PromoCode};
use crate::pricing::{PricingType, QuoteLine};
use crate::routing::TimeWindow;
use crate::store::{BookingStats, BookingStore, StatusCounts};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS bookings (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        phone TEXT NOT NULL,
        email TEXT NOT NULL,
        address TEXT NOT NULL,
        service TEXT NOT NULL,
        pickup_date TEXT NOT NULL,
        pickup_time TEXT,
        pricing_type TEXT NOT NULL,
        number_of_bags INTEGER NOT NULL DEFAULT 0,
        items TEXT NOT NULL DEFAULT '[]',
        price_per_bag INTEGER,
        subtotal INTEGER NOT NULL,
        discount_amount INTEGER NOT NULL DEFAULT 0,
        promo_code TEXT,
        total_price INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        notes TEXT NOT NULL DEFAULT '',
        driver_id TEXT REFERENCES drivers(id),
        lat REAL,
        lng REAL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status)",
    "CREATE INDEX IF NOT EXISTS idx_bookings_pickup_date ON bookings(pickup_date)",
    "CREATE INDEX IF NOT EXISTS idx_bookings_driver_id ON bookings(driver_id)",
    r#"
    CREATE TABLE IF NOT EXISTS drivers (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        phone TEXT,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS promo_codes (
        id TEXT PRIMARY KEY,
        code TEXT NOT NULL UNIQUE,
        discount_type TEXT NOT NULL,
        discount_value INTEGER NOT NULL,
        max_uses INTEGER NOT NULL DEFAULT 0,
        used_count INTEGER NOT NULL DEFAULT 0,
        expires_at TEXT,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )
    "#,
];

const BOOKING_COLUMNS: &str = "id, name, phone, email, address, service, pickup_date, \
     pickup_time, pricing_type, number_of_bags, items, price_per_bag, subtotal, \
     discount_amount, promo_code, total_price, status, notes, driver_id, lat, lng, \
     created_at, updated_at";

const REDEEM_PROMO: &str = "UPDATE promo_codes SET used_count = used_count + 1 \
     WHERE id = ? AND active = 1 AND (max_uses = 0 OR used_count < max_uses)";

const PROMO_COLUMNS: &str = "id, code, discount_type, discount_value, max_uses, used_count, \
     expires_at, active, created_at";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens the pool and creates any missing tables. In-memory URLs get a
    /// single connection that is never recycled: each SQLite connection owns
    /// its own memory database.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = options.connect(database_url).await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self { pool })
    }

    async fn fetch_booking(&self, id: Uuid) -> Result<Option<Booking>, AppError> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?");
        sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| booking_from_row(&row))
            .transpose()
    }

    async fn fetch_promo(&self, id: Uuid) -> Result<Option<PromoCode>, AppError> {
        let sql = format!("SELECT {PROMO_COLUMNS} FROM promo_codes WHERE id = ?");
        sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| promo_from_row(&row))
            .transpose()
    }

    /// Explains why a guarded redemption touched no row.
    async fn redeem_refusal(&self, id: Uuid) -> Result<AppError, AppError> {
        let reason = match self.fetch_promo(id).await? {
            None => return Ok(AppError::NotFound(format!("promo code {id} not found"))),
            Some(promo) if promo.active => "promo code has reached maximum uses",
            Some(_) => "promo code is no longer active",
        };
        Ok(AppError::Conflict(reason.to_string()))
    }

    async fn require_booking(&self, id: Uuid) -> Result<Booking, AppError> {
        self.fetch_booking(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))
    }
}

#[async_trait]
impl BookingStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn insert_booking(&self, booking: Booking) -> Result<Booking, AppError> {
        let sql = insert_booking_sql();
        booking_insert(&sql, &booking)?.execute(&self.pool).await?;
        Ok(booking)
    }

    /// Redeems and inserts inside one transaction; an early return drops the
    /// transaction, which rolls the redemption back.
    async fn insert_booking_with_promo(
        &self,
        booking: Booking,
        promo_id: Uuid,
    ) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await?;

        let redeemed = sqlx::query(REDEEM_PROMO)
            .bind(promo_id.to_string())
            .execute(&mut *tx)
            .await?;
        if redeemed.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(self.redeem_refusal(promo_id).await?);
        }

        let sql = insert_booking_sql();
        booking_insert(&sql, &booking)?.execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(booking)
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, AppError> {
        self.fetch_booking(id).await
    }

    async fn list_bookings(&self, status: Option<BookingStatus>) -> Result<Vec<Booking>, AppError> {
        let rows = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = ? ORDER BY created_at DESC"
                );
                sqlx::query(&sql)
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at DESC");
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };
        rows.iter().map(booking_from_row).collect()
    }

    async fn bookings_for_date(&self, date: NaiveDate) -> Result<Vec<Booking>, AppError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE pickup_date = ? ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(date.to_string())
            .fetch_all(&self.pool)
            .await?;
        let mut bookings = rows
            .iter()
            .map(booking_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        bookings.sort_by_key(|booking| booking.pickup_time);
        Ok(bookings)
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking, AppError> {
        let current = self.require_booking(id).await?;
        if !current.status.can_transition_to(status) {
            return Err(AppError::Conflict(format!(
                "cannot move booking from {} to {}",
                current.status, status
            )));
        }

        let result = sqlx::query(
            "UPDATE bookings SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(status.as_str())
        .bind(timestamp(&Utc::now()))
        .bind(id.to_string())
        .bind(current.status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "booking {id} changed while updating its status"
            )));
        }

        self.require_booking(id).await
    }

    async fn assign_driver(&self, id: Uuid, driver_id: Uuid) -> Result<Booking, AppError> {
        let result = sqlx::query(
            "UPDATE bookings SET driver_id = ?, updated_at = ? \
             WHERE id = ? AND status NOT IN ('completed', 'cancelled')",
        )
        .bind(driver_id.to_string())
        .bind(timestamp(&Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let booking = self.require_booking(id).await?;
            return Err(AppError::Conflict(format!(
                "booking is {} and cannot be reassigned",
                booking.status
            )));
        }

        self.require_booking(id).await
    }

    async fn delete_booking(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn booking_stats(&self) -> Result<BookingStats, AppError> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0) AS pending,
                COALESCE(SUM(CASE WHEN status = 'confirmed' THEN 1 ELSE 0 END), 0) AS confirmed,
                COALESCE(SUM(CASE WHEN status = 'in_progress' THEN 1 ELSE 0 END), 0) AS in_progress,
                COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed,
                COALESCE(SUM(CASE WHEN status = 'cancelled' THEN 1 ELSE 0 END), 0) AS cancelled,
                COALESCE(SUM(CASE WHEN status != 'cancelled' THEN total_price ELSE 0 END), 0) AS revenue,
                COALESCE(SUM(CASE WHEN status != 'cancelled' THEN number_of_bags ELSE 0 END), 0) AS bags
            FROM bookings
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let counts = StatusCounts {
            pending: column_u64(&row, "pending")?,
            confirmed: column_u64(&row, "confirmed")?,
            in_progress: column_u64(&row, "in_progress")?,
            completed: column_u64(&row, "completed")?,
            cancelled: column_u64(&row, "cancelled")?,
            revenue: column_u64(&row, "revenue")?,
            bags: column_u64(&row, "bags")?,
        };
        Ok(counts.into())
    }

    async fn insert_driver(&self, driver: Driver) -> Result<Driver, AppError> {
        sqlx::query("INSERT INTO drivers (id, name, phone, active, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(driver.id.to_string())
            .bind(&driver.name)
            .bind(driver.phone.as_deref())
            .bind(driver.active)
            .bind(timestamp(&driver.created_at))
            .execute(&self.pool)
            .await?;
        Ok(driver)
    }

    async fn get_driver(&self, id: Uuid) -> Result<Option<Driver>, AppError> {
        sqlx::query("SELECT id, name, phone, active, created_at FROM drivers WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| driver_from_row(&row))
            .transpose()
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, AppError> {
        let rows = sqlx::query("SELECT id, name, phone, active, created_at FROM drivers ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(driver_from_row).collect()
    }

    async fn driver_bookings(
        &self,
        driver_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, AppError> {
        let rows = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {BOOKING_COLUMNS} FROM bookings \
                     WHERE driver_id = ? AND status = ? ORDER BY created_at DESC"
                );
                sqlx::query(&sql)
                    .bind(driver_id.to_string())
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {BOOKING_COLUMNS} FROM bookings WHERE driver_id = ? ORDER BY created_at DESC"
                );
                sqlx::query(&sql)
                    .bind(driver_id.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(booking_from_row).collect()
    }

    async fn insert_promo(&self, promo: PromoCode) -> Result<PromoCode, AppError> {
        let sql = format!("INSERT INTO promo_codes ({PROMO_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)");
        let result = sqlx::query(&sql)
            .bind(promo.id.to_string())
            .bind(&promo.code)
            .bind(promo.discount_type.as_str())
            .bind(to_i64(promo.discount_value))
            .bind(i64::from(promo.max_uses))
            .bind(i64::from(promo.used_count))
            .bind(promo.expires_at.as_ref().map(timestamp))
            .bind(promo.active)
            .bind(timestamp(&promo.created_at))
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(promo),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Err(
                AppError::Conflict(format!("promo code {} already exists", promo.code)),
            ),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_promo(&self, code: &str) -> Result<Option<PromoCode>, AppError> {
        let sql = format!("SELECT {PROMO_COLUMNS} FROM promo_codes WHERE code = ?");
        sqlx::query(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| promo_from_row(&row))
            .transpose()
    }

    async fn list_promos(&self) -> Result<Vec<PromoCode>, AppError> {
        let sql = format!("SELECT {PROMO_COLUMNS} FROM promo_codes ORDER BY created_at DESC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(promo_from_row).collect()
    }

    async fn deactivate_promo(&self, id: Uuid) -> Result<PromoCode, AppError> {
        sqlx::query("UPDATE promo_codes SET active = 0 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        self.fetch_promo(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("promo code {id} not found")))
    }

    async fn redeem_promo(&self, id: Uuid) -> Result<PromoCode, AppError> {
        let result = sqlx::query(REDEEM_PROMO)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.redeem_refusal(id).await?);
        }

        self.fetch_promo(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("promo code {id} not found")))
    }
}

fn insert_booking_sql() -> String {
    format!(
        "INSERT INTO bookings ({BOOKING_COLUMNS}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
}

fn booking_insert<'q>(
    sql: &'q str,
    booking: &'q Booking,
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>, AppError> {
    let items = serde_json::to_string(&booking.items)
        .map_err(|err| AppError::Internal(format!("failed to encode booking items: {err}")))?;

    Ok(sqlx::query(sql)
        .bind(booking.id.to_string())
        .bind(&booking.name)
        .bind(&booking.phone)
        .bind(&booking.email)
        .bind(&booking.address)
        .bind(&booking.service)
        .bind(booking.pickup_date.to_string())
        .bind(booking.pickup_time.map(|window| window.as_str()))
        .bind(booking.pricing_type.as_str())
        .bind(i64::from(booking.number_of_bags))
        .bind(items)
        .bind(booking.price_per_bag.map(to_i64))
        .bind(to_i64(booking.subtotal))
        .bind(to_i64(booking.discount_amount))
        .bind(booking.promo_code.as_deref())
        .bind(to_i64(booking.total_price))
        .bind(booking.status.as_str())
        .bind(&booking.notes)
        .bind(booking.driver_id.map(|id| id.to_string()))
        .bind(booking.location.map(|point| point.lat))
        .bind(booking.location.map(|point| point.lng))
        .bind(timestamp(&booking.created_at))
        .bind(timestamp(&booking.updated_at)))
}

fn booking_from_row(row: &SqliteRow) -> Result<Booking, AppError> {
    let items: String = row.try_get("items")?;
    let items: Vec<QuoteLine> = serde_json::from_str(&items)
        .map_err(|err| AppError::Internal(format!("corrupt booking items: {err}")))?;

    let pickup_time = row
        .try_get::<Option<String>, _>("pickup_time")?
        .map(|raw| raw.parse::<TimeWindow>())
        .transpose()
        .map_err(AppError::Internal)?;

    let pricing_type = match row.try_get::<String, _>("pricing_type")?.as_str() {
        "per-bag" => PricingType::PerBag,
        "per-item" => PricingType::PerItem,
        other => {
            return Err(AppError::Internal(format!("unknown pricing type '{other}'")));
        }
    };

    let lat: Option<f64> = row.try_get("lat")?;
    let lng: Option<f64> = row.try_get("lng")?;
    let location = match (lat, lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
        _ => None,
    };

    Ok(Booking {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        address: row.try_get("address")?,
        service: row.try_get("service")?,
        pickup_date: parse_date(&row.try_get::<String, _>("pickup_date")?)?,
        pickup_time,
        pricing_type,
        number_of_bags: u32::try_from(column_u64(row, "number_of_bags")?)
            .map_err(|err| AppError::Internal(format!("invalid number_of_bags: {err}")))?,
        items,
        price_per_bag: row
            .try_get::<Option<i64>, _>("price_per_bag")?
            .map(|value| from_i64(value, "price_per_bag"))
            .transpose()?,
        subtotal: column_u64(row, "subtotal")?,
        discount_amount: column_u64(row, "discount_amount")?,
        promo_code: row.try_get("promo_code")?,
        total_price: column_u64(row, "total_price")?,
        status: row
            .try_get::<String, _>("status")?
            .parse::<BookingStatus>()
            .map_err(AppError::Internal)?,
        notes: row.try_get("notes")?,
        driver_id: row
            .try_get::<Option<String>, _>("driver_id")?
            .map(|raw| parse_uuid(&raw))
            .transpose()?,
        location,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn driver_from_row(row: &SqliteRow) -> Result<Driver, AppError> {
    Ok(Driver {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        active: row.try_get("active")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn promo_from_row(row: &SqliteRow) -> Result<PromoCode, AppError> {
    let discount_type = row.try_get::<String, _>("discount_type")?;
    let discount_type = DiscountType::parse(&discount_type)
        .ok_or_else(|| AppError::Internal(format!("unknown discount type '{discount_type}'")))?;

    Ok(PromoCode {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        code: row.try_get("code")?,
        discount_type,
        discount_value: column_u64(row, "discount_value")?,
        max_uses: u32::try_from(column_u64(row, "max_uses")?)
            .map_err(|err| AppError::Internal(format!("invalid max_uses: {err}")))?,
        used_count: u32::try_from(column_u64(row, "used_count")?)
            .map_err(|err| AppError::Internal(format!("invalid used_count: {err}")))?,
        expires_at: row
            .try_get::<Option<String>, _>("expires_at")?
            .map(|raw| parse_timestamp(&raw))
            .transpose()?,
        active: row.try_get("active")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn column_u64(row: &SqliteRow, column: &str) -> Result<u64, AppError> {
    from_i64(row.try_get::<i64, _>(column)?, column)
}

fn from_i64(value: i64, column: &str) -> Result<u64, AppError> {
    u64::try_from(value).map_err(|_| AppError::Internal(format!("negative value in {column}")))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Fixed-width UTC text, so lexical order matches time order.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| AppError::Internal(format!("invalid timestamp '{raw}': {err}")))
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    raw.parse::<NaiveDate>()
        .map_err(|err| AppError::Internal(format!("invalid date '{raw}': {err}")))
}

fn parse_uuid(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|err| AppError::Internal(format!("invalid id '{raw}': {err}")))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn booking(status: BookingStatus) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            name: "Sam".to_string(),
            phone: "2065550199".to_string(),
            email: "sam@example.com".to_string(),
            address: "400 Broad St, Seattle".to_string(),
            service: "dry-cleaning".to_string(),
            pickup_date: NaiveDate::from_ymd_opt(2026, 10, 21).unwrap(),
            pickup_time: Some(TimeWindow::Evening),
            pricing_type: PricingType::PerItem,
            number_of_bags: 0,
            items: vec![QuoteLine {
                item_key: "tie".to_string(),
                name: "Tie".to_string(),
                quantity: 2,
                unit_price: 500,
                line_total: 1000,
            }],
            price_per_bag: None,
            subtotal: 1000,
            discount_amount: 200,
            promo_code: Some("SAVE20".to_string()),
            total_price: 800,
            status,
            notes: "side door".to_string(),
            driver_id: None,
            location: Some(GeoPoint {
                lat: 47.62,
                lng: -122.35,
            }),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn booking_round_trips_through_sqlite() {
        let store = store().await;
        let original = booking(BookingStatus::Pending);
        store.insert_booking(original.clone()).await.unwrap();

        let loaded = store.get_booking(original.id).await.unwrap().unwrap();
        assert_eq!(loaded.items, original.items);
        assert_eq!(loaded.pickup_time, Some(TimeWindow::Evening));
        assert_eq!(loaded.location, original.location);
        assert_eq!(loaded.total_price, 800);
        assert_eq!(loaded.promo_code.as_deref(), Some("SAVE20"));
    }

    #[tokio::test]
    async fn status_transitions_are_checked() {
        let store = store().await;
        let created = store.insert_booking(booking(BookingStatus::Pending)).await.unwrap();

        let err = store
            .update_booking_status(created.id, BookingStatus::InProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let cancelled = store
            .update_booking_status(created.id, BookingStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        let stats = store.booking_stats().await.unwrap();
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.total_revenue, 0);
    }

    #[tokio::test]
    async fn promo_redemption_respects_limit() {
        let store = store().await;
        let promo = PromoCode {
            id: Uuid::new_v4(),
            code: "TWICE".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: 10,
            max_uses: 2,
            used_count: 0,
            expires_at: Some(Utc::now() + Duration::days(7)),
            active: true,
            created_at: Utc::now(),
        };
        store.insert_promo(promo.clone()).await.unwrap();

        assert!(matches!(
            store.insert_promo(promo.clone()).await,
            Err(AppError::Conflict(_))
        ));

        assert_eq!(store.redeem_promo(promo.id).await.unwrap().used_count, 1);
        assert_eq!(store.redeem_promo(promo.id).await.unwrap().used_count, 2);
        assert!(matches!(
            store.redeem_promo(promo.id).await,
            Err(AppError::Conflict(_))
        ));

        let found = store.find_promo("TWICE").await.unwrap().unwrap();
        assert_eq!(found.used_count, 2);
        assert!(found.expires_at.is_some());
    }

    #[tokio::test]
    async fn driver_bookings_filter_by_driver() {
        let store = store().await;
        let driver = Driver {
            id: Uuid::new_v4(),
            name: "Riley".to_string(),
            phone: None,
            active: true,
            created_at: Utc::now(),
        };
        store.insert_driver(driver.clone()).await.unwrap();

        let assigned = store.insert_booking(booking(BookingStatus::Confirmed)).await.unwrap();
        store.insert_booking(booking(BookingStatus::Confirmed)).await.unwrap();
        store.assign_driver(assigned.id, driver.id).await.unwrap();

        let mine = store.driver_bookings(driver.id, None).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].driver_id, Some(driver.id));
        let drivers = store.list_drivers().await.unwrap();
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers[0].name, "Riley");
    }

    #[tokio::test]
    async fn failed_booking_insert_rolls_back_redemption() {
        let store = store().await;
        let promo = PromoCode {
            id: Uuid::new_v4(),
            code: "ONCE".to_string(),
            discount_type: DiscountType::Fixed,
            discount_value: 500,
            max_uses: 1,
            used_count: 0,
            expires_at: None,
            active: true,
            created_at: Utc::now(),
        };
        store.insert_promo(promo.clone()).await.unwrap();
        let existing = store.insert_booking(booking(BookingStatus::Pending)).await.unwrap();

        assert!(store
            .insert_booking_with_promo(existing, promo.id)
            .await
            .is_err());
        assert_eq!(store.find_promo("ONCE").await.unwrap().unwrap().used_count, 0);

        let fresh = booking(BookingStatus::Pending);
        store.insert_booking_with_promo(fresh.clone(), promo.id).await.unwrap();
        assert!(store.get_booking(fresh.id).await.unwrap().is_some());
        assert_eq!(store.find_promo("ONCE").await.unwrap().unwrap().used_count, 1);

        let late = booking(BookingStatus::Pending);
        assert!(matches!(
            store.insert_booking_with_promo(late.clone(), promo.id).await,
            Err(AppError::Conflict(_))
        ));
        assert!(store.get_booking(late.id).await.unwrap().is_none());
    }
}
