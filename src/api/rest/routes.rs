use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::booking::{Booking, BookingStatus};
use crate::routing::{
    generate_daily_routes, geocode_missing, optimize_route, route_metrics, Geocodable, Route,
    RouteMetrics, RouteStop, StopInput, TimeWindow, WindowRoute,
};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/routes", get(daily_routes))
        .route("/routes/optimize", post(optimize))
        .route("/routes/optimize/windows", post(optimize_windows))
        .route("/routes/metrics", post(metrics))
}

/// The slice of a booking a driver needs at the door.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingStop {
    pub id: Uuid,
    pub reference: String,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub service: String,
    pub pickup_time: Option<TimeWindow>,
    pub status: BookingStatus,
    pub number_of_bags: u32,
    pub notes: String,
    pub location: Option<GeoPoint>,
}

impl From<&Booking> for BookingStop {
    fn from(booking: &Booking) -> Self {
        Self {
            id: booking.id,
            reference: booking.reference(),
            name: booking.name.clone(),
            phone: booking.phone.clone(),
            address: booking.address.clone(),
            service: booking.service.clone(),
            pickup_time: booking.pickup_time,
            status: booking.status,
            number_of_bags: booking.number_of_bags,
            notes: booking.notes.clone(),
            location: booking.location,
        }
    }
}

impl RouteStop for BookingStop {
    fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    fn time_window(&self) -> Option<TimeWindow> {
        self.pickup_time
    }
}

impl Geocodable for BookingStop {
    fn address(&self) -> &str {
        &self.address
    }

    fn coordinates(&self) -> Option<GeoPoint> {
        self.location
    }

    fn set_location(&mut self, point: GeoPoint) {
        self.location = Some(point);
    }
}

#[derive(Deserialize)]
pub struct DailyRoutesQuery {
    pub date: NaiveDate,
}

#[derive(Serialize)]
pub struct DailyRoutesResponse {
    pub date: NaiveDate,
    pub total_stops: usize,
    pub windows: Vec<WindowRoute<BookingStop>>,
}

#[derive(Deserialize)]
pub struct OptimizeRequest {
    pub stops: Vec<StopInput>,
    #[serde(default)]
    pub start: Option<GeoPoint>,
}

#[derive(Deserialize)]
pub struct MetricsRequest {
    pub stops: Vec<StopInput>,
}

async fn fill_locations<T: Geocodable>(state: &AppState, stops: &mut [T]) {
    if let Some(geocoder) = &state.geocoder {
        let resolved = geocode_missing(geocoder.as_ref(), stops).await;
        if resolved > 0 {
            info!(resolved, "geocoded stops without coordinates");
        }
    }
}

fn route_start(state: &AppState, start: Option<GeoPoint>) -> Result<Option<GeoPoint>, AppError> {
    match start {
        Some(point) if !point.is_valid() => {
            Err(AppError::BadRequest("start is out of range".to_string()))
        }
        Some(point) => Ok(Some(point)),
        None => Ok(state.depot),
    }
}

async fn daily_routes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DailyRoutesQuery>,
) -> Result<Json<DailyRoutesResponse>, AppError> {
    let mut stops: Vec<BookingStop> = state
        .store
        .bookings_for_date(query.date)
        .await?
        .iter()
        .filter(|booking| booking.status != BookingStatus::Cancelled)
        .map(BookingStop::from)
        .collect();

    fill_locations(&state, &mut stops).await;

    let windows = generate_daily_routes(&stops, state.depot, &state.route_params);
    for window in &windows {
        state.metrics.record_route(window.route.total_distance);
    }

    info!(date = %query.date, stops = stops.len(), windows = windows.len(), "daily routes built");
    Ok(Json(DailyRoutesResponse {
        date: query.date,
        total_stops: stops.len(),
        windows,
    }))
}

async fn optimize(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OptimizeRequest>,
) -> Result<Json<Route<StopInput>>, AppError> {
    let start = route_start(&state, payload.start)?;
    let mut stops = payload.stops;
    fill_locations(&state, &mut stops).await;

    let route = optimize_route(&stops, start, &state.route_params);
    state.metrics.record_route(route.total_distance);
    Ok(Json(route))
}

async fn optimize_windows(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OptimizeRequest>,
) -> Result<Json<Vec<WindowRoute<StopInput>>>, AppError> {
    let start = route_start(&state, payload.start)?;
    let mut stops = payload.stops;
    fill_locations(&state, &mut stops).await;

    let windows = generate_daily_routes(&stops, start, &state.route_params);
    for window in &windows {
        state.metrics.record_route(window.route.total_distance);
    }
    Ok(Json(windows))
}

/// Measures a route in the order given, without reordering it.
async fn metrics(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MetricsRequest>,
) -> Json<RouteMetrics> {
    Json(route_metrics(&payload.stops, &state.route_params))
}
