use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::pricing::{PricingType, QuoteLine};
use crate::routing::TimeWindow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// `pending -> confirmed -> in_progress -> completed`, plus `cancelled`
    /// from any non-terminal state.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        match (self, next) {
            (BookingStatus::Pending, BookingStatus::Confirmed)
            | (BookingStatus::Confirmed, BookingStatus::InProgress)
            | (BookingStatus::InProgress, BookingStatus::Completed) => true,
            (current, BookingStatus::Cancelled) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == raw)
            .ok_or_else(|| format!("unknown booking status '{raw}'"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub service: String,
    pub pickup_date: NaiveDate,
    pub pickup_time: Option<TimeWindow>,
    pub pricing_type: PricingType,
    pub number_of_bags: u32,
    pub items: Vec<QuoteLine>,
    pub price_per_bag: Option<u64>,
    pub subtotal: u64,
    pub discount_amount: u64,
    pub promo_code: Option<String>,
    pub total_price: u64,
    pub status: BookingStatus,
    pub notes: String,
    pub driver_id: Option<Uuid>,
    pub location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// First eight hex digits of the id, used in customer-facing messages.
    pub fn reference(&self) -> String {
        self.id.simple().to_string()[..8].to_uppercase()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingEventKind {
    Created,
    StatusChanged,
    DriverAssigned,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingEvent {
    pub kind: BookingEventKind,
    pub booking_id: Uuid,
    pub status: BookingStatus,
    pub driver_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

impl BookingEvent {
    pub fn new(kind: BookingEventKind, booking: &Booking) -> Self {
        Self {
            kind,
            booking_id: booking.id,
            status: booking.status,
            driver_id: booking.driver_id,
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BookingStatus::{self, *};

    #[test]
    fn forward_lifecycle_is_allowed() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
    }

    #[test]
    fn skipping_or_reversing_is_rejected() {
        assert!(!Pending.can_transition_to(InProgress));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn cancel_only_from_non_terminal_states() {
        for status in [Pending, Confirmed, InProgress] {
            assert!(status.can_transition_to(Cancelled));
        }
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!("in_progress".parse::<BookingStatus>(), Ok(InProgress));
        assert!("shipped".parse::<BookingStatus>().is_err());
        for status in BookingStatus::ALL {
            assert_eq!(status.as_str().parse::<BookingStatus>(), Ok(status));
        }
    }
}
