use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;
use crate::routing::optimizer::{optimize_route, Route};
use crate::routing::{RouteParams, RouteStop};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Morning,
    Afternoon,
    Evening,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 3] = [
        TimeWindow::Morning,
        TimeWindow::Afternoon,
        TimeWindow::Evening,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Morning => "morning",
            TimeWindow::Afternoon => "afternoon",
            TimeWindow::Evening => "evening",
        }
    }

    pub fn time_range(&self) -> &'static str {
        match self {
            TimeWindow::Morning => "8:00 AM - 12:00 PM",
            TimeWindow::Afternoon => "12:00 PM - 5:00 PM",
            TimeWindow::Evening => "5:00 PM - 8:00 PM",
        }
    }

    fn index(&self) -> usize {
        match self {
            TimeWindow::Morning => 0,
            TimeWindow::Afternoon => 1,
            TimeWindow::Evening => 2,
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        TimeWindow::ALL
            .into_iter()
            .find(|window| window.as_str() == raw)
            .ok_or_else(|| format!("unknown time window '{raw}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowRoute<T> {
    pub time_window: TimeWindow,
    pub time_range: &'static str,
    #[serde(flatten)]
    pub route: Route<T>,
}

/// Splits stops into morning, afternoon and evening, keeping input order
/// within each bucket. Untagged stops go to the afternoon.
pub fn group_by_time_window<T: RouteStop>(stops: &[T]) -> [(TimeWindow, Vec<T>); 3] {
    let mut groups = TimeWindow::ALL.map(|window| (window, Vec::new()));
    for stop in stops {
        let window = stop.time_window().unwrap_or(TimeWindow::Afternoon);
        groups[window.index()].1.push(stop.clone());
    }
    groups
}

/// Optimizes each non-empty window on its own. Windows are never merged.
pub fn generate_daily_routes<T: RouteStop>(
    stops: &[T],
    start: Option<GeoPoint>,
    params: &RouteParams,
) -> Vec<WindowRoute<T>> {
    group_by_time_window(stops)
        .into_iter()
        .filter(|(_, members)| !members.is_empty())
        .map(|(time_window, members)| WindowRoute {
            time_window,
            time_range: time_window.time_range(),
            route: optimize_route(&members, start, params),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::StopInput;

    fn stop(id: &str, window: Option<TimeWindow>, lat: f64) -> StopInput {
        StopInput {
            id: id.to_string(),
            label: None,
            address: None,
            location: Some(GeoPoint { lat, lng: -122.33 }),
            time_window: window,
        }
    }

    #[test]
    fn groups_keep_input_order_and_default_to_afternoon() {
        let stops = vec![
            stop("e1", Some(TimeWindow::Evening), 47.60),
            stop("m1", Some(TimeWindow::Morning), 47.61),
            stop("u1", None, 47.62),
            stop("m2", Some(TimeWindow::Morning), 47.63),
        ];
        let [morning, afternoon, evening] = group_by_time_window(&stops);

        assert_eq!(morning.0, TimeWindow::Morning);
        let morning_ids: Vec<_> = morning.1.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(morning_ids, vec!["m1", "m2"]);
        assert_eq!(afternoon.1[0].id, "u1");
        assert_eq!(evening.1[0].id, "e1");
    }

    #[test]
    fn daily_routes_skip_empty_windows() {
        let stops = vec![
            stop("m1", Some(TimeWindow::Morning), 47.60),
            stop("e1", Some(TimeWindow::Evening), 47.70),
            stop("e2", Some(TimeWindow::Evening), 47.71),
        ];
        let routes = generate_daily_routes(&stops, None, &RouteParams::default());

        let windows: Vec<_> = routes.iter().map(|r| r.time_window).collect();
        assert_eq!(windows, vec![TimeWindow::Morning, TimeWindow::Evening]);
        assert_eq!(routes[0].route.stops, 1);
        assert_eq!(routes[0].route.total_distance, 0.0);
        assert_eq!(routes[1].route.stops, 2);
        assert_eq!(routes[1].time_range, "5:00 PM - 8:00 PM");
    }

    #[test]
    fn windows_are_never_merged() {
        let stops = vec![
            stop("m", Some(TimeWindow::Morning), 47.60),
            stop("a", Some(TimeWindow::Afternoon), 47.60),
        ];
        let routes = generate_daily_routes(&stops, None, &RouteParams::default());
        assert_eq!(routes.len(), 2);
        assert!(routes.iter().all(|r| r.route.route.len() == 1));
    }

    #[test]
    fn flattened_json_carries_route_fields() {
        let stops = vec![stop("m", Some(TimeWindow::Morning), 47.60)];
        let routes = generate_daily_routes(&stops, None, &RouteParams::default());
        let json = serde_json::to_value(&routes[0]).unwrap();
        assert_eq!(json["time_window"], "morning");
        assert_eq!(json["time_range"], "8:00 AM - 12:00 PM");
        assert_eq!(json["stops"], 1);
        assert_eq!(json["route"][0]["id"], "m");
    }
}
