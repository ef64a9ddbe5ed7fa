use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::geo::GeoPoint;

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<GeoPoint, AppError>;
}

/// Stands in for a real geocoding service: scatters addresses randomly
/// around a fixed centre.
#[derive(Debug, Clone)]
pub struct MockGeocoder {
    center: GeoPoint,
    spread_degrees: f64,
}

impl MockGeocoder {
    pub fn new(center: GeoPoint, spread_degrees: f64) -> Self {
        Self {
            center,
            spread_degrees,
        }
    }

    pub fn seattle() -> Self {
        Self::new(
            GeoPoint {
                lat: 47.6062,
                lng: -122.3321,
            },
            0.1,
        )
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeoPoint, AppError> {
        if address.trim().is_empty() {
            return Err(AppError::BadRequest("address is empty".to_string()));
        }

        let (lat_jitter, lng_jitter) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5))
        };

        let point = GeoPoint {
            lat: self.center.lat + lat_jitter * self.spread_degrees,
            lng: self.center.lng + lng_jitter * self.spread_degrees,
        };
        debug!(address, lat = point.lat, lng = point.lng, "mock geocoded address");
        Ok(point)
    }
}

/// Anything that carries an address and may lack coordinates.
pub trait Geocodable {
    fn address(&self) -> &str;
    fn coordinates(&self) -> Option<GeoPoint>;
    fn set_location(&mut self, point: GeoPoint);
}

/// Fills in missing coordinates. A failed lookup leaves the stop unlocated.
pub async fn geocode_missing<T: Geocodable>(geocoder: &dyn Geocoder, stops: &mut [T]) -> usize {
    let mut resolved = 0;
    for stop in stops.iter_mut() {
        if stop.coordinates().is_some() {
            continue;
        }
        match geocoder.geocode(stop.address()).await {
            Ok(point) => {
                stop.set_location(point);
                resolved += 1;
            }
            Err(err) => {
                warn!(address = stop.address(), error = %err, "failed to geocode address");
            }
        }
    }
    resolved
}
