use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::Json;
use axum::Router;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::rest::pricing::quantity_selection;
use crate::api::rest::promos::check_promo;
use crate::engine::queue::enqueue_notification;
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::booking::{Booking, BookingEventKind, BookingStatus};
use crate::notify::NotificationJob;
use crate::pricing::{compute_price, ItemSelection, PricingType};
use crate::routing::TimeWindow;
use crate::state::AppState;
use crate::store::BookingStats;

/// Bag count for a per-bag booking that does not give one.
const DEFAULT_BAGS: i64 = 1;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(list_bookings).post(create_booking))
        .route("/bookings/:id", get(get_booking).delete(delete_booking))
        .route("/bookings/:id/status", patch(update_status))
        .route("/bookings/:id/driver", patch(assign_driver))
        .route("/stats", get(stats))
}

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub pickup_date: Option<NaiveDate>,
    #[serde(default)]
    pub pickup_time: Option<TimeWindow>,
    #[serde(default)]
    pub number_of_bags: Option<i64>,
    #[serde(default)]
    pub items: Option<Vec<ItemSelection>>,
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

#[derive(Deserialize)]
pub struct ListBookingsQuery {
    pub status: Option<BookingStatus>,
    pub date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

#[derive(Deserialize)]
pub struct AssignDriverRequest {
    pub driver_id: Uuid,
}

impl CreateBookingRequest {
    fn missing_fields(&self) -> Vec<&'static str> {
        let text_fields = [
            ("name", &self.name),
            ("phone", &self.phone),
            ("email", &self.email),
            ("address", &self.address),
            ("service", &self.service),
        ];

        let mut missing: Vec<&'static str> = text_fields
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| field)
            .collect();
        if self.pickup_date.is_none() {
            missing.push("pickup_date");
        }
        missing
    }
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let missing = payload.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }
    let pickup_date = payload
        .pickup_date
        .ok_or_else(|| AppError::BadRequest("missing required fields: pickup_date".to_string()))?;

    if payload.location.is_some_and(|point| !point.is_valid()) {
        return Err(AppError::BadRequest("location is out of range".to_string()));
    }

    let service = payload.service.trim().to_string();
    let selection = quantity_selection(
        &state.catalog,
        &service,
        payload.number_of_bags,
        payload.items,
        DEFAULT_BAGS,
    );
    let quote = compute_price(&state.catalog, &service, selection)?;

    let promo_code = payload
        .promo_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty());
    let promo = match promo_code {
        Some(code) => Some(check_promo(&state, code, quote.total).await?),
        None => None,
    };

    let now = Utc::now();
    let booking = Booking {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        phone: payload.phone.trim().to_string(),
        email: payload.email.trim().to_string(),
        address: payload.address.trim().to_string(),
        service,
        pickup_date,
        pickup_time: payload.pickup_time,
        pricing_type: quote.pricing_type,
        number_of_bags: match quote.pricing_type {
            PricingType::PerBag => quote.number_of_bags.unwrap_or_default(),
            PricingType::PerItem => 0,
        },
        items: quote.items,
        price_per_bag: quote.price_per_bag,
        subtotal: quote.total,
        discount_amount: promo.as_ref().map_or(0, |applied| applied.discount_amount),
        promo_code: promo.as_ref().map(|applied| applied.code.clone()),
        total_price: promo.as_ref().map_or(quote.total, |applied| applied.new_total),
        status: BookingStatus::Pending,
        notes: payload.notes.unwrap_or_default(),
        driver_id: None,
        location: payload.location,
        created_at: now,
        updated_at: now,
    };

    let booking = match &promo {
        Some(applied) => {
            state
                .store
                .insert_booking_with_promo(booking, applied.promo_id)
                .await?
        }
        None => state.store.insert_booking(booking).await?,
    };

    state
        .metrics
        .bookings_created_total
        .with_label_values(&[booking.service.as_str()])
        .inc();
    state.emit_event(BookingEventKind::Created, &booking);

    if let Err(err) =
        enqueue_notification(&state, NotificationJob::BookingConfirmation(booking.clone())).await
    {
        warn!(booking_id = %booking.id, error = %err, "failed to queue confirmation");
    }

    info!(
        booking_id = %booking.id,
        service = %booking.service,
        total_price = booking.total_price,
        "booking created"
    );

    Ok((StatusCode::CREATED, Json(booking)))
}

async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = match query.date {
        Some(date) => state
            .store
            .bookings_for_date(date)
            .await?
            .into_iter()
            .filter(|booking| query.status.is_none_or(|status| booking.status == status))
            .collect(),
        None => state.store.list_bookings(query.status).await?,
    };
    Ok(Json(bookings))
}

async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    state
        .store
        .get_booking(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))
}

async fn delete_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let booking = state
        .store
        .get_booking(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))?;

    if !state.store.delete_booking(id).await? {
        return Err(AppError::NotFound(format!("booking {id} not found")));
    }

    state.emit_event(BookingEventKind::Deleted, &booking);
    info!(booking_id = %id, "booking deleted");

    Ok(StatusCode::NO_CONTENT)
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.store.update_booking_status(id, payload.status).await?;

    state
        .metrics
        .booking_status_changes_total
        .with_label_values(&[booking.status.as_str()])
        .inc();
    state.emit_event(BookingEventKind::StatusChanged, &booking);

    if let Err(err) =
        enqueue_notification(&state, NotificationJob::StatusUpdate(booking.clone())).await
    {
        warn!(booking_id = %booking.id, error = %err, "failed to queue status update");
    }

    info!(booking_id = %booking.id, status = %booking.status, "booking status updated");
    Ok(Json(booking))
}

async fn assign_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignDriverRequest>,
) -> Result<Json<Booking>, AppError> {
    let driver = state
        .store
        .get_driver(payload.driver_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("driver {} not found", payload.driver_id)))?;

    if !driver.active {
        return Err(AppError::BadRequest(format!(
            "driver {} is not active",
            driver.name
        )));
    }

    let booking = state.store.assign_driver(id, driver.id).await?;
    state.emit_event(BookingEventKind::DriverAssigned, &booking);

    info!(booking_id = %booking.id, driver_id = %driver.id, "driver assigned");
    Ok(Json(booking))
}

async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<BookingStats>, AppError> {
    Ok(Json(state.store.booking_stats().await?))
}
