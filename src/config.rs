use std::env;
use std::str::FromStr;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::routing::RouteParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeocoderKind {
    Mock,
    Disabled,
}

impl FromStr for GeocoderKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(GeocoderKind::Mock),
            "none" | "off" | "disabled" => Ok(GeocoderKind::Disabled),
            other => Err(format!("unknown geocoder '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub notification_queue_size: usize,
    pub store_backend: StoreBackend,
    pub database_url: String,
    pub depot: Option<GeoPoint>,
    pub route_params: RouteParams,
    pub geocoder: GeocoderKind,
    pub business_name: String,
    pub tracking_url: String,
    pub static_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            notification_queue_size: 1024,
            store_backend: StoreBackend::Memory,
            database_url: "sqlite://laundry.db?mode=rwc".to_string(),
            depot: None,
            route_params: RouteParams::default(),
            geocoder: GeocoderKind::Mock,
            business_name: "ArielGo".to_string(),
            tracking_url: "http://localhost:3001".to_string(),
            static_dir: "website".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let route_params = RouteParams {
            average_speed_mph: parse_or_default(
                "ROUTE_AVG_SPEED_MPH",
                defaults.route_params.average_speed_mph,
            )?,
            dwell_minutes_per_stop: parse_or_default(
                "ROUTE_DWELL_MINUTES",
                defaults.route_params.dwell_minutes_per_stop,
            )?,
        };
        validate_route_params(&route_params)?;

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            notification_queue_size: parse_or_default(
                "NOTIFICATION_QUEUE_SIZE",
                defaults.notification_queue_size,
            )?,
            store_backend: parse_or_default("STORE_BACKEND", defaults.store_backend)?,
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            depot: depot_from_env()?,
            route_params,
            geocoder: parse_or_default("GEOCODER", defaults.geocoder)?,
            business_name: env::var("BUSINESS_NAME").unwrap_or(defaults.business_name),
            tracking_url: env::var("TRACKING_URL").unwrap_or(defaults.tracking_url),
            static_dir: env::var("STATIC_DIR").unwrap_or(defaults.static_dir),
        })
    }
}

fn validate_route_params(params: &RouteParams) -> Result<(), AppError> {
    if !(params.average_speed_mph.is_finite() && params.average_speed_mph > 0.0) {
        return Err(AppError::Internal(
            "invalid ROUTE_AVG_SPEED_MPH: must be a positive number".to_string(),
        ));
    }
    if !(params.dwell_minutes_per_stop.is_finite() && params.dwell_minutes_per_stop >= 0.0) {
        return Err(AppError::Internal(
            "invalid ROUTE_DWELL_MINUTES: must be zero or a positive number".to_string(),
        ));
    }
    Ok(())
}

fn depot_from_env() -> Result<Option<GeoPoint>, AppError> {
    let lat = parse_optional::<f64>("DEPOT_LAT")?;
    let lng = parse_optional::<f64>("DEPOT_LNG")?;

    match (lat, lng) {
        (Some(lat), Some(lng)) => {
            let depot = GeoPoint { lat, lng };
            if !depot.is_valid() {
                return Err(AppError::Internal(format!(
                    "invalid DEPOT_LAT/DEPOT_LNG: ({lat}, {lng}) is not a coordinate"
                )));
            }
            Ok(Some(depot))
        }
        (None, None) => Ok(None),
        _ => Err(AppError::Internal(
            "invalid DEPOT_LAT/DEPOT_LNG: set both or neither".to_string(),
        )),
    }
}

fn parse_optional<T>(key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => parse_value(key, &raw).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|err| AppError::Internal(format!("invalid {key}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_parses_case_insensitively() {
        assert_eq!("SQLite".parse::<StoreBackend>(), Ok(StoreBackend::Sqlite));
        assert_eq!(" memory ".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn geocoder_accepts_none_alias() {
        assert_eq!("none".parse::<GeocoderKind>(), Ok(GeocoderKind::Disabled));
        assert_eq!("mock".parse::<GeocoderKind>(), Ok(GeocoderKind::Mock));
    }

    #[test]
    fn parse_value_reports_the_key() {
        let err = parse_value::<u16>("HTTP_PORT", "not-a-port").unwrap_err();
        assert!(err.to_string().contains("invalid HTTP_PORT"));
    }

    #[test]
    fn defaults_match_route_constants() {
        let config = Config::default();
        assert_eq!(config.route_params.average_speed_mph, 30.0);
        assert_eq!(config.route_params.dwell_minutes_per_stop, 5.0);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert!(config.depot.is_none());
    }

    #[test]
    fn route_params_reject_unusable_values() {
        assert!(validate_route_params(&RouteParams::default()).is_ok());

        let no_dwell = RouteParams {
            dwell_minutes_per_stop: 0.0,
            ..RouteParams::default()
        };
        assert!(validate_route_params(&no_dwell).is_ok());

        for dwell in [-1.0, f64::NAN, f64::INFINITY] {
            let params = RouteParams {
                dwell_minutes_per_stop: dwell,
                ..RouteParams::default()
            };
            let err = validate_route_params(&params).unwrap_err();
            assert!(err.to_string().contains("ROUTE_DWELL_MINUTES"));
        }

        let stalled = RouteParams {
            average_speed_mph: 0.0,
            ..RouteParams::default()
        };
        let err = validate_route_params(&stalled).unwrap_err();
        assert!(err.to_string().contains("ROUTE_AVG_SPEED_MPH"));
    }
}
