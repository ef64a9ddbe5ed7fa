use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::catalog::{PricingCatalog, PricingType, Rate, ServiceOffering};
use crate::pricing::format_cents;

pub const SUBSCRIPTION_DISCOUNT_PERCENT: u64 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("invalid service type: {service}. Must be one of: {valid}")]
    UnknownService { service: String, valid: String },

    #[error("number of bags must be at least 1")]
    InvalidBagCount,

    #[error("at least one item is required")]
    EmptyItems,

    #[error("none of the selected items are offered by {service}")]
    NoValidItems { service: String },

    #[error("{service} is priced {expected}")]
    QuantityMismatch {
        service: String,
        expected: PricingType,
    },

    #[error("order total is too large")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSelection {
    pub item_key: String,
    pub quantity: u32,
    #[serde(default)]
    pub unit_price_override: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantitySelection {
    Bags(i64),
    Items(Vec<ItemSelection>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub item_key: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: u64,
    pub line_total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub base_price: String,
    pub quantity: String,
    pub total: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub service_type: String,
    pub service_name: String,
    pub pricing_type: PricingType,
    pub turnaround: String,
    pub price_per_bag: Option<u64>,
    pub number_of_bags: Option<u32>,
    pub items: Vec<QuoteLine>,
    pub total: u64,
    pub total_display: String,
    pub breakdown: PriceBreakdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionQuote {
    pub service_type: String,
    pub monthly_bags: u32,
    pub normal_total: u64,
    pub normal_total_display: String,
    pub discount_rate: String,
    pub subscription_total: u64,
    pub subscription_total_display: String,
    pub savings: u64,
    pub savings_display: String,
}

/// Prices a selection against the catalog.
///
/// Per-bag services multiply the bag rate by the bag count. Per-item services
/// sum `quantity * price` over the recognised items, preferring a supplied
/// override price; unknown keys and zero quantities are skipped, and a list
/// with nothing left is rejected.
pub fn compute_price(
    catalog: &PricingCatalog,
    service_type: &str,
    selection: QuantitySelection,
) -> Result<PriceQuote, PricingError> {
    let service = catalog
        .get(service_type)
        .ok_or_else(|| PricingError::UnknownService {
            service: service_type.to_string(),
            valid: catalog.service_keys().join(", "),
        })?;

    match (&service.rate, selection) {
        (Rate::PerBag { price_per_bag }, QuantitySelection::Bags(bags)) => {
            price_bags(service, *price_per_bag, bags)
        }
        (Rate::PerItem { .. }, QuantitySelection::Items(items)) => price_items(service, &items),
        (_, _) => Err(PricingError::QuantityMismatch {
            service: service.service_type.to_string(),
            expected: service.pricing_type(),
        }),
    }
}

fn price_bags(
    service: &ServiceOffering,
    price_per_bag: u64,
    bags: i64,
) -> Result<PriceQuote, PricingError> {
    let bags = u32::try_from(bags)
        .ok()
        .filter(|count| *count >= 1)
        .ok_or(PricingError::InvalidBagCount)?;

    let total = price_per_bag
        .checked_mul(u64::from(bags))
        .ok_or(PricingError::Overflow)?;

    Ok(PriceQuote {
        service_type: service.service_type.to_string(),
        service_name: service.name.to_string(),
        pricing_type: PricingType::PerBag,
        turnaround: service.turnaround.to_string(),
        price_per_bag: Some(price_per_bag),
        number_of_bags: Some(bags),
        items: Vec::new(),
        total,
        total_display: format_cents(total),
        breakdown: PriceBreakdown {
            base_price: format!("{} per bag", format_cents(price_per_bag)),
            quantity: pluralize(u64::from(bags), "bag"),
            total: format_cents(total),
        },
    })
}

fn price_items(
    service: &ServiceOffering,
    selections: &[ItemSelection],
) -> Result<PriceQuote, PricingError> {
    if selections.is_empty() {
        return Err(PricingError::EmptyItems);
    }

    let mut lines = Vec::with_capacity(selections.len());
    let mut total: u64 = 0;
    let mut pieces: u64 = 0;

    for selection in selections {
        let Some(catalog_item) = service.item(&selection.item_key) else {
            continue;
        };
        if selection.quantity == 0 {
            continue;
        }

        let unit_price = selection.unit_price_override.unwrap_or(catalog_item.price);
        let line_total = unit_price
            .checked_mul(u64::from(selection.quantity))
            .ok_or(PricingError::Overflow)?;
        total = total.checked_add(line_total).ok_or(PricingError::Overflow)?;
        pieces += u64::from(selection.quantity);

        lines.push(QuoteLine {
            item_key: catalog_item.key.to_string(),
            name: catalog_item.name.to_string(),
            quantity: selection.quantity,
            unit_price,
            line_total,
        });
    }

    if lines.is_empty() {
        return Err(PricingError::NoValidItems {
            service: service.service_type.to_string(),
        });
    }

    Ok(PriceQuote {
        service_type: service.service_type.to_string(),
        service_name: service.name.to_string(),
        pricing_type: PricingType::PerItem,
        turnaround: service.turnaround.to_string(),
        price_per_bag: None,
        number_of_bags: None,
        items: lines,
        total,
        total_display: format_cents(total),
        breakdown: PriceBreakdown {
            base_price: "itemized".to_string(),
            quantity: pluralize(pieces, "item"),
            total: format_cents(total),
        },
    })
}

/// Monthly plan price for a per-bag service: the normal total less a flat
/// percentage, rounded down to the cent.
pub fn subscription_quote(
    catalog: &PricingCatalog,
    service_type: &str,
    monthly_bags: i64,
) -> Result<SubscriptionQuote, PricingError> {
    let normal = compute_price(catalog, service_type, QuantitySelection::Bags(monthly_bags))?;
    let bags = normal.number_of_bags.unwrap_or_default();

    let discounted = u128::from(normal.total) * u128::from(100 - SUBSCRIPTION_DISCOUNT_PERCENT) / 100;
    let subscription_total = u64::try_from(discounted).map_err(|_| PricingError::Overflow)?;
    let savings = normal.total - subscription_total;

    Ok(SubscriptionQuote {
        service_type: normal.service_type,
        monthly_bags: bags,
        normal_total: normal.total,
        normal_total_display: normal.total_display,
        discount_rate: format!("{SUBSCRIPTION_DISCOUNT_PERCENT}%"),
        subscription_total,
        subscription_total_display: format_cents(subscription_total),
        savings,
        savings_display: format_cents(savings),
    })
}

fn pluralize(count: u64, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
