use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::error::AppError;
use crate::pricing::{
    compute_price, subscription_quote, ItemSelection, PriceQuote, PricingCatalog, PricingType,
    QuantitySelection, ServiceOffering, SubscriptionQuote,
};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pricing", get(list_services))
        .route("/pricing/quote", post(quote))
        .route("/pricing/subscription", post(subscription))
        .route("/pricing/:service", get(get_service))
}

#[derive(Deserialize)]
pub struct QuoteRequest {
    pub service_type: String,
    #[serde(default)]
    pub number_of_bags: Option<i64>,
    #[serde(default)]
    pub items: Option<Vec<ItemSelection>>,
}

#[derive(Deserialize)]
pub struct SubscriptionRequest {
    pub service_type: String,
    pub monthly_bags: i64,
}

/// Picks the quantity form from what the caller sent. When neither is sent,
/// the service's own pricing type decides: per-item services get an empty
/// list and per-bag services get `default_bags`.
pub(crate) fn quantity_selection(
    catalog: &PricingCatalog,
    service_type: &str,
    number_of_bags: Option<i64>,
    items: Option<Vec<ItemSelection>>,
    default_bags: i64,
) -> QuantitySelection {
    match (items, number_of_bags) {
        (Some(items), _) => QuantitySelection::Items(items),
        (None, Some(bags)) => QuantitySelection::Bags(bags),
        (None, None) => match catalog.get(service_type).map(ServiceOffering::pricing_type) {
            Some(PricingType::PerItem) => QuantitySelection::Items(Vec::new()),
            _ => QuantitySelection::Bags(default_bags),
        },
    }
}

async fn list_services(State(state): State<Arc<AppState>>) -> Json<Vec<ServiceOffering>> {
    Json(state.catalog.services().to_vec())
}

async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
) -> Result<Json<ServiceOffering>, AppError> {
    state
        .catalog
        .get(&service)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("service {service} not found")))
}

async fn quote(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QuoteRequest>,
) -> Result<Json<PriceQuote>, AppError> {
    let selection = quantity_selection(
        &state.catalog,
        &payload.service_type,
        payload.number_of_bags,
        payload.items,
        0,
    );
    let quote = compute_price(&state.catalog, &payload.service_type, selection)?;
    Ok(Json(quote))
}

async fn subscription(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubscriptionRequest>,
) -> Result<Json<SubscriptionQuote>, AppError> {
    let quote = subscription_quote(&state.catalog, &payload.service_type, payload.monthly_bags)?;
    Ok(Json(quote))
}
