use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_MILES: f64 = 3_959.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Finite and inside the lat/lng ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Great-circle distance in miles. Not road distance.
pub fn haversine_miles(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_MILES * central_angle
}

#[cfg(test)]
mod tests {
    use super::{haversine_miles, GeoPoint};

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 47.6062,
            lng: -122.3321,
        };
        let distance = haversine_miles(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn seattle_to_portland_is_around_145_miles() {
        let seattle = GeoPoint {
            lat: 47.6062,
            lng: -122.3321,
        };
        let portland = GeoPoint {
            lat: 45.5152,
            lng: -122.6784,
        };
        let distance = haversine_miles(&seattle, &portland);
        assert!((distance - 145.0).abs() < 3.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = GeoPoint {
            lat: 47.60,
            lng: -122.33,
        };
        let b = GeoPoint {
            lat: 47.61,
            lng: -122.34,
        };
        assert!((haversine_miles(&a, &b) - haversine_miles(&b, &a)).abs() < 1e-12);
    }

    #[test]
    fn rejects_out_of_range_points() {
        assert!(!GeoPoint { lat: 91.0, lng: 0.0 }.is_valid());
        assert!(!GeoPoint { lat: 0.0, lng: f64::NAN }.is_valid());
        assert!(GeoPoint { lat: -33.9, lng: 151.2 }.is_valid());
    }
}
