//! Service pricing: the static catalog, the quote engine, and promo codes.
//!
//! All amounts are integer cents. Dollar strings are rendered for display only.

pub mod catalog;
pub mod engine;
pub mod promo;

pub use catalog::{CatalogItem, PricingCatalog, PricingType, Rate, ServiceOffering};
pub use engine::{
    compute_price, subscription_quote, ItemSelection, PriceBreakdown, PriceQuote, PricingError,
    QuantitySelection, QuoteLine, SubscriptionQuote,
};

/// Renders cents as `$d.cc`.
pub fn format_cents(cents: u64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::format_cents;

    #[test]
    fn formats_whole_and_fractional_dollars() {
        assert_eq!(format_cents(0), "$0.00");
        assert_eq!(format_cents(5), "$0.05");
        assert_eq!(format_cents(3200), "$32.00");
        assert_eq!(format_cents(123_456), "$1234.56");
    }
}
