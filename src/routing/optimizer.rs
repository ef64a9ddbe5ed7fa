use serde::Serialize;

use crate::geo::{haversine_miles, GeoPoint};
use crate::routing::{RouteParams, RouteStop};

pub const GEOCODING_REQUIRED: &str = "Geocoding required for route optimization";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route<T> {
    pub route: Vec<T>,
    /// Stops without usable coordinates, in input order.
    pub unrouted: Vec<T>,
    /// Miles, summed over the selected legs.
    pub total_distance: f64,
    /// Minutes.
    pub estimated_time: u32,
    pub stops: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl<T> Route<T> {
    pub fn empty() -> Self {
        Self {
            route: Vec::new(),
            unrouted: Vec::new(),
            total_distance: 0.0,
            estimated_time: 0,
            stops: 0,
            note: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteMetrics {
    pub total_distance: f64,
    pub total_stops: usize,
    pub estimated_time: u32,
    pub average_stop_distance: f64,
}

/// Greedy nearest-neighbour sequencing.
///
/// Starts at `start`, or at the first located stop. Each step moves to the
/// closest unvisited stop; ties go to the earliest stop in input order. No
/// backtracking, so the result is deterministic but not optimal.
pub fn optimize_route<T: RouteStop>(
    stops: &[T],
    start: Option<GeoPoint>,
    params: &RouteParams,
) -> Route<T> {
    if stops.is_empty() {
        return Route::empty();
    }

    let mut remaining: Vec<(GeoPoint, &T)> = Vec::with_capacity(stops.len());
    let mut unrouted = Vec::new();
    for stop in stops {
        match stop.location().filter(GeoPoint::is_valid) {
            Some(point) => remaining.push((point, stop)),
            None => unrouted.push(stop.clone()),
        }
    }

    if remaining.is_empty() {
        return Route {
            route: stops.to_vec(),
            unrouted: Vec::new(),
            total_distance: 0.0,
            estimated_time: 0,
            stops: stops.len(),
            note: Some(GEOCODING_REQUIRED.to_string()),
        };
    }

    let mut current = start.unwrap_or(remaining[0].0);
    let mut route = Vec::with_capacity(remaining.len());
    let mut total_distance = 0.0;

    while !remaining.is_empty() {
        let mut nearest_index = 0;
        let mut nearest_distance = f64::INFINITY;

        for (index, (point, _)) in remaining.iter().enumerate() {
            let distance = haversine_miles(&current, point);
            if distance < nearest_distance {
                nearest_distance = distance;
                nearest_index = index;
            }
        }

        let (point, stop) = remaining.remove(nearest_index);
        route.push(stop.clone());
        total_distance += nearest_distance;
        current = point;
    }

    let note = if unrouted.is_empty() {
        None
    } else {
        Some(format!(
            "{} stop(s) lack coordinates and were not optimized",
            unrouted.len()
        ))
    };

    Route {
        estimated_time: estimate_minutes(total_distance, route.len(), params),
        stops: route.len(),
        route,
        unrouted,
        total_distance,
        note,
    }
}

/// `ceil(distance / speed * 60 + stops * dwell)`.
pub fn estimate_minutes(distance_miles: f64, stop_count: usize, params: &RouteParams) -> u32 {
    let driving = distance_miles / params.average_speed_mph * 60.0;
    let dwelling = stop_count as f64 * params.dwell_minutes_per_stop;
    (driving + dwelling).ceil() as u32
}

/// Metrics for a route that is already in visiting order. Legs with an
/// unlocated end are skipped.
pub fn route_metrics<T: RouteStop>(route: &[T], params: &RouteParams) -> RouteMetrics {
    let total_distance: f64 = route
        .windows(2)
        .filter_map(|pair| {
            let from = pair[0].location().filter(GeoPoint::is_valid)?;
            let to = pair[1].location().filter(GeoPoint::is_valid)?;
            Some(haversine_miles(&from, &to))
        })
        .sum();

    let total_stops = route.len();
    let average_stop_distance = if total_stops > 1 {
        total_distance / (total_stops - 1) as f64
    } else {
        0.0
    };

    RouteMetrics {
        total_distance,
        total_stops,
        estimated_time: estimate_minutes(total_distance, total_stops, params),
        average_stop_distance,
    }
}
