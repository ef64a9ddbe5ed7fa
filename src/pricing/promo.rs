use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::promo::{DiscountType, PromoApplication, PromoCode};
use crate::pricing::format_cents;
use crate::store::BookingStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PromoRejection {
    #[error("invalid promo code")]
    Unknown,

    #[error("promo code is no longer active")]
    Inactive,

    #[error("promo code has expired")]
    Expired,

    #[error("promo code has reached maximum uses")]
    Exhausted,
}

impl PromoRejection {
    pub fn label(&self) -> &'static str {
        match self {
            PromoRejection::Unknown => "unknown",
            PromoRejection::Inactive => "inactive",
            PromoRejection::Expired => "expired",
            PromoRejection::Exhausted => "exhausted",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPromoCode {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: u64,
    #[serde(default)]
    pub max_uses: u32,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl NewPromoCode {
    /// Validates the request and builds the stored code, upper-cased.
    pub fn into_promo(self, now: DateTime<Utc>) -> Result<PromoCode, AppError> {
        let code = normalize_code(&self.code);
        if code.is_empty() {
            return Err(AppError::BadRequest("code cannot be empty".to_string()));
        }
        if code.chars().any(char::is_whitespace) {
            return Err(AppError::BadRequest(
                "code cannot contain whitespace".to_string(),
            ));
        }

        match self.discount_type {
            DiscountType::Percentage if !(1..=100).contains(&self.discount_value) => {
                return Err(AppError::BadRequest(
                    "percentage discount must be between 1 and 100".to_string(),
                ));
            }
            DiscountType::Fixed if self.discount_value == 0 => {
                return Err(AppError::BadRequest(
                    "fixed discount must be at least 1 cent".to_string(),
                ));
            }
            _ => {}
        }

        Ok(PromoCode {
            id: Uuid::new_v4(),
            code,
            discount_type: self.discount_type,
            discount_value: self.discount_value,
            max_uses: self.max_uses,
            used_count: 0,
            expires_at: self.expires_at,
            active: self.active,
            created_at: now,
        })
    }
}

pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Looks the code up case-insensitively and prices it against `subtotal`
/// without redeeming it. The outer error is a store failure; the inner one is
/// the verdict on the code itself.
pub async fn validate_promo_code(
    store: &dyn BookingStore,
    code: &str,
    subtotal: u64,
    now: DateTime<Utc>,
) -> Result<Result<PromoApplication, PromoRejection>, AppError> {
    let verdict = match store.find_promo(&normalize_code(code)).await? {
        Some(promo) => promo.apply(subtotal, now),
        None => Err(PromoRejection::Unknown),
    };
    Ok(verdict)
}

impl PromoCode {
    /// Active, not past `expires_at`, and under the use limit.
    pub fn check(&self, now: DateTime<Utc>) -> Result<(), PromoRejection> {
        if !self.active {
            return Err(PromoRejection::Inactive);
        }
        if self.expires_at.is_some_and(|expires_at| expires_at < now) {
            return Err(PromoRejection::Expired);
        }
        if self.is_exhausted() {
            return Err(PromoRejection::Exhausted);
        }
        Ok(())
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_uses > 0 && self.used_count >= self.max_uses
    }

    pub fn discount_for(&self, subtotal: u64) -> u64 {
        let raw = match self.discount_type {
            DiscountType::Percentage => percentage_discount(subtotal, self.discount_value),
            DiscountType::Fixed => self.discount_value,
        };
        clamp_discount(raw, subtotal)
    }

    pub fn apply(
        &self,
        subtotal: u64,
        now: DateTime<Utc>,
    ) -> Result<PromoApplication, PromoRejection> {
        self.check(now)?;
        let discount_amount = self.discount_for(subtotal);

        Ok(PromoApplication {
            promo_id: self.id,
            code: self.code.clone(),
            discount_type: self.discount_type,
            discount_value: self.discount_value,
            discount_amount,
            new_total: subtotal - discount_amount,
        })
    }
}

/// `round(subtotal * percent / 100)`, halves rounding up.
pub fn percentage_discount(subtotal: u64, percent: u64) -> u64 {
    let scaled = (u128::from(subtotal) * u128::from(percent) + 50) / 100;
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

pub fn clamp_discount(discount: u64, subtotal: u64) -> u64 {
    discount.min(subtotal)
}

pub fn format_discount(discount_type: DiscountType, discount_value: u64) -> String {
    match discount_type {
        DiscountType::Percentage => format!("{discount_value}% off"),
        DiscountType::Fixed => format!("{} off", format_cents(discount_value)),
    }
}
