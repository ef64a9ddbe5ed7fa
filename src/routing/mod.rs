//! Pickup route planning.
//!
//! Stops are sequenced with a greedy nearest-neighbour walk over Haversine
//! distances and split into the three pickup windows. Nothing here performs
//! I/O except the geocoder.

pub mod geocode;
pub mod optimizer;
pub mod windows;

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

pub use geocode::{geocode_missing, Geocodable, Geocoder, MockGeocoder};
pub use optimizer::{estimate_minutes, optimize_route, route_metrics, Route, RouteMetrics};
pub use windows::{generate_daily_routes, group_by_time_window, TimeWindow, WindowRoute};

/// Anything the optimizer can visit.
pub trait RouteStop: Clone {
    fn location(&self) -> Option<GeoPoint>;

    fn time_window(&self) -> Option<TimeWindow> {
        None
    }
}

/// Travel-time assumptions. Not calibrated against traffic data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteParams {
    pub average_speed_mph: f64,
    pub dwell_minutes_per_stop: f64,
}

impl Default for RouteParams {
    fn default() -> Self {
        Self {
            average_speed_mph: 30.0,
            dwell_minutes_per_stop: 5.0,
        }
    }
}

/// A stop supplied directly by a caller rather than loaded from a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopInput {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
}

impl RouteStop for StopInput {
    fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    fn time_window(&self) -> Option<TimeWindow> {
        self.time_window
    }
}

impl Geocodable for StopInput {
    fn address(&self) -> &str {
        self.address.as_deref().unwrap_or_default()
    }

    fn coordinates(&self) -> Option<GeoPoint> {
        self.location
    }

    fn set_location(&mut self, point: GeoPoint) {
        self.location = Some(point);
    }
}
