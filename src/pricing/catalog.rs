use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PricingType {
    PerBag,
    PerItem,
}

impl PricingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingType::PerBag => "per-bag",
            PricingType::PerItem => "per-item",
        }
    }
}

impl fmt::Display for PricingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogItem {
    pub key: &'static str,
    pub name: &'static str,
    pub price: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "pricing_type", rename_all = "kebab-case")]
pub enum Rate {
    PerBag { price_per_bag: u64 },
    PerItem { items: Vec<CatalogItem> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceOffering {
    pub service_type: &'static str,
    pub name: &'static str,
    pub category: &'static str,
    pub turnaround: &'static str,
    #[serde(flatten)]
    pub rate: Rate,
}

impl ServiceOffering {
    pub fn pricing_type(&self) -> PricingType {
        match self.rate {
            Rate::PerBag { .. } => PricingType::PerBag,
            Rate::PerItem { .. } => PricingType::PerItem,
        }
    }

    pub fn item(&self, key: &str) -> Option<&CatalogItem> {
        match &self.rate {
            Rate::PerItem { items } => items.iter().find(|item| item.key == key),
            Rate::PerBag { .. } => None,
        }
    }
}

/// Immutable service catalog, built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct PricingCatalog {
    services: Vec<ServiceOffering>,
}

impl PricingCatalog {
    pub fn new(services: Vec<ServiceOffering>) -> Self {
        Self { services }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            per_bag("standard", "Standard (24-hour)", 3200, "24 hours"),
            per_bag("same-day", "Same-Day", 4200, "Same day"),
            per_bag("rush", "Rush (4-hour)", 5000, "4 hours"),
            ServiceOffering {
                service_type: "dry-cleaning",
                name: "Dry Cleaning",
                category: "dry-cleaning",
                turnaround: "3-5 days",
                rate: Rate::PerItem {
                    items: vec![
                        item("dress-shirt", "Dress Shirt", 450),
                        item("pants", "Pants / Trousers", 750),
                        item("suit-2pc", "Suit (2-piece)", 1800),
                        item("dress", "Dress", 1400),
                        item("blouse", "Blouse", 700),
                        item("sweater", "Sweater", 800),
                        item("coat-jacket", "Coat / Jacket", 2000),
                        item("tie", "Tie", 500),
                    ],
                },
            },
            ServiceOffering {
                service_type: "specialty",
                name: "Specialty Items",
                category: "specialty",
                turnaround: "3-5 days",
                rate: Rate::PerItem {
                    items: vec![
                        item("comforter-twin", "Comforter (Twin/Full)", 2500),
                        item("comforter-queen", "Comforter (Queen)", 3000),
                        item("comforter-king", "Comforter (King)", 3800),
                        item("blanket", "Blanket", 1800),
                        item("duvet-cover", "Duvet Cover", 2000),
                        item("sheet-set", "Sheet Set", 1800),
                        item("pillow", "Pillow", 1000),
                        item("mattress-pad", "Mattress Pad", 2200),
                    ],
                },
            },
        ])
    }

    pub fn get(&self, service_type: &str) -> Option<&ServiceOffering> {
        self.services
            .iter()
            .find(|service| service.service_type == service_type)
    }

    pub fn services(&self) -> &[ServiceOffering] {
        &self.services
    }

    pub fn service_keys(&self) -> Vec<&'static str> {
        self.services.iter().map(|s| s.service_type).collect()
    }
}

fn per_bag(
    service_type: &'static str,
    name: &'static str,
    price_per_bag: u64,
    turnaround: &'static str,
) -> ServiceOffering {
    ServiceOffering {
        service_type,
        name,
        category: "wash-fold",
        turnaround,
        rate: Rate::PerBag { price_per_bag },
    }
}

fn item(key: &'static str, name: &'static str, price: u64) -> CatalogItem {
    CatalogItem { key, name, price }
}
