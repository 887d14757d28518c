use dotenvy::dotenv;
use std::env;

use crate::geo::{GeoPoint, Geofence};

// Fallback clinic perimeter used when no location is configured.
const DEFAULT_CLINIC_LATITUDE: f64 = 30.0122589;
const DEFAULT_CLINIC_LONGITUDE: f64 = 30.9870651;
const DEFAULT_CLINIC_RADIUS_M: u32 = 2000;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,
    pub api_prefix: String,

    pub clinic_latitude: f64,
    pub clinic_longitude: f64,
    pub clinic_radius_m: u32,

    // Rate limiting
    pub rate_attendance_per_min: u32,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),

            clinic_latitude: env::var("CLINIC_LATITUDE")
                .unwrap_or_else(|_| DEFAULT_CLINIC_LATITUDE.to_string())
                .parse()
                .unwrap(),
            clinic_longitude: env::var("CLINIC_LONGITUDE")
                .unwrap_or_else(|_| DEFAULT_CLINIC_LONGITUDE.to_string())
                .parse()
                .unwrap(),
            clinic_radius_m: env::var("CLINIC_RADIUS_M")
                .unwrap_or_else(|_| DEFAULT_CLINIC_RADIUS_M.to_string())
                .parse()
                .unwrap(),

            rate_attendance_per_min: env::var("RATE_ATTENDANCE_PER_MIN")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap(),
        }
    }

    /// Injected into the service at construction; no process-wide singleton.
    pub fn geofence(&self) -> Geofence {
        Geofence::new(
            GeoPoint::new(self.clinic_latitude, self.clinic_longitude),
            self.clinic_radius_m,
        )
    }
}
