//! IoT telemetry models

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One immutable sensor reading, keyed by human-readable batch id and the
/// role of the originating device (e.g. "truck", "crate").
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SensorReading {
    pub id: i64,
    pub batch_id: String,
    pub device_role: String,
    pub crate_temp: Option<f64>,
    pub reefer_temp: Option<f64>,
    pub humidity: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub fan_on: Option<bool>,
    pub ts: DateTime<Utc>,
}

/// Last-seen record for a reporting device
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Device {
    pub device_id: String,
    pub role: String,
    pub last_seen: DateTime<Utc>,
}
