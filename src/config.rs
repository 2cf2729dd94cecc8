use std::env;

use crate::models::Coordinate;

#[derive(Clone, Debug)]
pub struct Config {
    pub backend_url: String,
    pub directions_api_url: String,
    pub directions_api_key: Option<String>,
    pub server_address: String,
    pub depot: Option<Coordinate>,
    pub shift_utc_offset_hours: i32,
    pub schedule_poll_secs: u64,
    pub eta_poll_secs: u64,
    pub volume_recheck_secs: u64,
    pub http_timeout_secs: u64,
    pub fallback_speed_kmh: f64,
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let depot = match (
            env::var("DEPOT_LATITUDE").ok().and_then(|v| v.trim().parse().ok()),
            env::var("DEPOT_LONGITUDE").ok().and_then(|v| v.trim().parse().ok()),
        ) {
            (Some(latitude), Some(longitude)) => Some(Coordinate::new(latitude, longitude)),
            _ => None,
        };

        Ok(Config {
            backend_url: env::var("BACKEND_URL")?,
            directions_api_url: env::var("DIRECTIONS_API_URL")
                .unwrap_or_else(|_| "https://maps.googleapis.com".to_string()),
            directions_api_key: env::var("DIRECTIONS_API_KEY").ok().filter(|k| !k.is_empty()),
            server_address: env::var("SERVER_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:3003".to_string()),
            depot,
            // shifts follow depot local time
            shift_utc_offset_hours: parsed_or("SHIFT_UTC_OFFSET_HOURS", 8),
            schedule_poll_secs: parsed_or("SCHEDULE_POLL_SECS", 3),
            eta_poll_secs: parsed_or("ETA_POLL_SECS", 30),
            volume_recheck_secs: parsed_or("VOLUME_RECHECK_SECS", 5),
            http_timeout_secs: parsed_or("HTTP_TIMEOUT_SECS", 10),
            fallback_speed_kmh: parsed_or("FALLBACK_SPEED_KMH", 25.0),
        })
    }
}
