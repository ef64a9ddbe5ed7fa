use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::booking::{Booking, BookingStatus};
use crate::models::driver::Driver;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", get(list_drivers).post(create_driver))
        .route("/drivers/:id/bookings", get(driver_bookings))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Deserialize)]
pub struct DriverBookingsQuery {
    pub status: Option<BookingStatus>,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<(StatusCode, Json<Driver>), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let driver = Driver {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        phone: payload
            .phone
            .map(|phone| phone.trim().to_string())
            .filter(|phone| !phone.is_empty()),
        active: payload.active,
        created_at: Utc::now(),
    };

    let driver = state.store.insert_driver(driver).await?;
    info!(driver_id = %driver.id, name = %driver.name, "driver registered");

    Ok((StatusCode::CREATED, Json(driver)))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Driver>>, AppError> {
    Ok(Json(state.store.list_drivers().await?))
}

async fn driver_bookings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<DriverBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    if state.store.get_driver(id).await?.is_none() {
        return Err(AppError::NotFound(format!("driver {id} not found")));
    }
    Ok(Json(state.store.driver_bookings(id, query.status).await?))
}
