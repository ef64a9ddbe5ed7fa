use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::promo::{PromoApplication, PromoCode};
use crate::pricing::format_cents;
use crate::pricing::promo::{format_discount, validate_promo_code, NewPromoCode};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/promo", get(list_promos).post(create_promo))
        .route("/promo/validate", post(validate))
        .route("/promo/:id/deactivate", post(deactivate_promo))
}

#[derive(Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub subtotal: u64,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(flatten)]
    pub application: PromoApplication,
    pub description: String,
    pub discount_display: String,
    pub new_total_display: String,
}

/// Validates a code and counts the outcome. Store failures propagate as-is;
/// a rejected code becomes a 400 with the rejection reason.
pub(crate) async fn check_promo(
    state: &AppState,
    code: &str,
    subtotal: u64,
) -> Result<PromoApplication, AppError> {
    let verdict = validate_promo_code(state.store.as_ref(), code, subtotal, Utc::now()).await?;
    let outcome = match &verdict {
        Ok(_) => "valid",
        Err(rejection) => rejection.label(),
    };
    state
        .metrics
        .promo_validations_total
        .with_label_values(&[outcome])
        .inc();
    Ok(verdict?)
}

async fn validate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, AppError> {
    if payload.code.trim().is_empty() || payload.subtotal == 0 {
        return Err(AppError::BadRequest(
            "code and subtotal are required".to_string(),
        ));
    }

    let application = check_promo(&state, &payload.code, payload.subtotal).await?;
    Ok(Json(ValidateResponse {
        valid: true,
        description: format_discount(application.discount_type, application.discount_value),
        discount_display: format_cents(application.discount_amount),
        new_total_display: format_cents(application.new_total),
        application,
    }))
}

async fn list_promos(State(state): State<Arc<AppState>>) -> Result<Json<Vec<PromoCode>>, AppError> {
    Ok(Json(state.store.list_promos().await?))
}

async fn create_promo(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewPromoCode>,
) -> Result<(StatusCode, Json<PromoCode>), AppError> {
    let promo = payload.into_promo(Utc::now())?;
    let promo = state.store.insert_promo(promo).await?;

    info!(promo_id = %promo.id, code = %promo.code, "promo code created");
    Ok((StatusCode::CREATED, Json(promo)))
}

async fn deactivate_promo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PromoCode>, AppError> {
    let promo = state.store.deactivate_promo(id).await?;
    info!(promo_id = %promo.id, code = %promo.code, "promo code deactivated");
    Ok(Json(promo))
}
