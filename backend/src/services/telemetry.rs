//! IoT telemetry ingestion and aggregation
//!
//! Devices report readings keyed by the human-readable batch id and a
//! device role. Timestamps arrive as epoch seconds. Every accepted reading
//! also refreshes the device's last-seen record. Aggregation is a plain
//! arithmetic mean over an inclusive time window; an empty window yields
//! null, not zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::telemetry::{Device, SensorReading};

/// One reading as reported by a device
#[derive(Debug, Deserialize)]
pub struct IngestInput {
    pub batch_id: String,
    /// Optional; readings that omit it are attributed to a device named
    /// after the batch itself
    pub device_id: Option<String>,
    pub role: String,
    pub crate_temp: Option<f64>,
    pub reefer_temp: Option<f64>,
    pub humidity: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub fan_on: Option<bool>,
    /// Epoch seconds
    pub ts: Option<i64>,
}

/// Metric selectable for single-column averaging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    CrateTemp,
    ReeferTemp,
    Humidity,
}

impl Metric {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "crate_temp" => Some(Metric::CrateTemp),
            "reefer_temp" => Some(Metric::ReeferTemp),
            "humidity" => Some(Metric::Humidity),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Metric::CrateTemp => "crate_temp",
            Metric::ReeferTemp => "reefer_temp",
            Metric::Humidity => "humidity",
        }
    }
}

/// Inclusive time window for aggregation, epoch seconds
#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

/// Windowed arithmetic means, fleet-wide or scoped to one batch
#[derive(Debug, Serialize)]
pub struct TelemetrySummary {
    pub batch_id: Option<String>,
    pub samples: i64,
    pub crate_temp: Option<f64>,
    pub reefer_temp: Option<f64>,
    pub humidity: Option<f64>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Arithmetic mean; `None` for an empty slice
pub fn arithmetic_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Convert reported epoch seconds to a UTC timestamp
pub fn epoch_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

/// Identifier for the device last-seen record. Falls back to the batch id
/// when the reading names no device.
pub fn device_identifier(batch_id: &str, device_id: Option<&str>) -> String {
    match device_id.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => batch_id.trim().to_string(),
    }
}

/// Resolve an epoch-seconds window to UTC bounds. Defaults run from the
/// epoch up to now; an inverted window is rejected.
pub fn resolve_window(window: &WindowQuery) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let from = window
        .from
        .and_then(epoch_to_utc)
        .unwrap_or(DateTime::UNIX_EPOCH);
    let to = window.to.and_then(epoch_to_utc).unwrap_or_else(Utc::now);
    if from > to {
        return Err(AppError::Validation {
            field: "from".to_string(),
            message: "Window start must not be after its end".to_string(),
        });
    }
    Ok((from, to))
}

/// Telemetry ingestion and query service
#[derive(Clone)]
pub struct TelemetryService {
    db: PgPool,
}

impl TelemetryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Store one reading and refresh the device's last-seen record.
    /// Ingestion does not require the batch to exist yet; devices may
    /// start reporting before the batch row is registered.
    pub async fn ingest(&self, input: IngestInput) -> AppResult<SensorReading> {
        if input.batch_id.trim().is_empty() {
            return Err(AppError::Validation {
                field: "batch_id".to_string(),
                message: "Batch id is required".to_string(),
            });
        }
        if input.role.trim().is_empty() {
            return Err(AppError::Validation {
                field: "role".to_string(),
                message: "Device role is required".to_string(),
            });
        }

        let epoch = input.ts.ok_or_else(|| AppError::Validation {
            field: "ts".to_string(),
            message: "Epoch timestamp is required".to_string(),
        })?;
        let ts = epoch_to_utc(epoch).ok_or_else(|| AppError::Validation {
            field: "ts".to_string(),
            message: "Timestamp is out of range".to_string(),
        })?;

        let mut tx = self.db.begin().await?;

        let reading = sqlx::query_as::<_, SensorReading>(
            r#"
            INSERT INTO sensor_readings (
                batch_id, device_role, crate_temp, reefer_temp, humidity, lat, lon, fan_on, ts
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(input.batch_id.trim())
        .bind(input.role.trim())
        .bind(input.crate_temp)
        .bind(input.reefer_temp)
        .bind(input.humidity)
        .bind(input.lat)
        .bind(input.lon)
        .bind(input.fan_on)
        .bind(ts)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO devices (device_id, role, last_seen)
            VALUES ($1, $2, $3)
            ON CONFLICT (device_id)
            DO UPDATE SET role = EXCLUDED.role, last_seen = GREATEST(devices.last_seen, EXCLUDED.last_seen)
            "#,
        )
        .bind(device_identifier(
            &input.batch_id,
            input.device_id.as_deref(),
        ))
        .bind(input.role.trim())
        .bind(ts)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(reading)
    }

    /// Readings for a batch in chronological order
    pub async fn readings(&self, batch_id: &str, limit: i64) -> AppResult<Vec<SensorReading>> {
        let rows = sqlx::query_as::<_, SensorReading>(
            "SELECT * FROM sensor_readings WHERE batch_id = $1 ORDER BY ts ASC LIMIT $2",
        )
        .bind(batch_id)
        .bind(limit.clamp(1, 1000))
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Most recent reading reported by any device of a role
    pub async fn latest_for_role(&self, role: &str) -> AppResult<Option<SensorReading>> {
        let row = sqlx::query_as::<_, SensorReading>(
            "SELECT * FROM sensor_readings WHERE device_role = $1 ORDER BY ts DESC LIMIT 1",
        )
        .bind(role)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    /// Latest reading per device role for a batch
    pub async fn latest_per_role(&self, batch_id: &str) -> AppResult<Vec<SensorReading>> {
        let rows = sqlx::query_as::<_, SensorReading>(
            r#"
            SELECT DISTINCT ON (device_role) *
            FROM sensor_readings
            WHERE batch_id = $1
            ORDER BY device_role, ts DESC
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Most recent reading carrying a position fix, if any
    pub async fn latest_location(&self, batch_id: &str) -> AppResult<Option<SensorReading>> {
        let row = sqlx::query_as::<_, SensorReading>(
            r#"
            SELECT * FROM sensor_readings
            WHERE batch_id = $1 AND lat IS NOT NULL AND lon IS NOT NULL
            ORDER BY ts DESC
            LIMIT 1
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    /// Mean of one metric over the inclusive window, across every device
    /// unless scoped to one batch; `None` when the window holds no samples
    pub async fn average(
        &self,
        batch_id: Option<&str>,
        metric: Metric,
        window: &WindowQuery,
    ) -> AppResult<Option<f64>> {
        let (from, to) = resolve_window(window)?;

        // Column name comes from the closed Metric enum, never the request
        let sql = format!(
            "SELECT {} FROM sensor_readings \
             WHERE ($1::varchar IS NULL OR batch_id = $1) AND ts >= $2 AND ts <= $3",
            metric.column()
        );
        let values: Vec<Option<f64>> = sqlx::query_scalar(&sql)
            .bind(batch_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.db)
            .await?;

        let values: Vec<f64> = values.into_iter().flatten().collect();
        Ok(arithmetic_mean(&values))
    }

    /// Arithmetic means over the inclusive window, across every device
    /// unless scoped to one batch. An empty window leaves every mean null.
    pub async fn averages(
        &self,
        batch_id: Option<&str>,
        window: WindowQuery,
    ) -> AppResult<TelemetrySummary> {
        let (from, to) = resolve_window(&window)?;

        let rows = sqlx::query_as::<_, (Option<f64>, Option<f64>, Option<f64>)>(
            r#"
            SELECT crate_temp, reefer_temp, humidity
            FROM sensor_readings
            WHERE ($1::varchar IS NULL OR batch_id = $1) AND ts >= $2 AND ts <= $3
            "#,
        )
        .bind(batch_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;

        let column = |pick: fn(&(Option<f64>, Option<f64>, Option<f64>)) -> Option<f64>| {
            rows.iter().filter_map(pick).collect::<Vec<f64>>()
        };

        Ok(TelemetrySummary {
            batch_id: batch_id.map(str::to_string),
            samples: rows.len() as i64,
            crate_temp: arithmetic_mean(&column(|r| r.0)),
            reefer_temp: arithmetic_mean(&column(|r| r.1)),
            humidity: arithmetic_mean(&column(|r| r.2)),
            from,
            to,
        })
    }

    /// Known devices ordered by most recently seen
    pub async fn devices(&self) -> AppResult<Vec<Device>> {
        let rows =
            sqlx::query_as::<_, Device>("SELECT * FROM devices ORDER BY last_seen DESC")
                .fetch_all(&self.db)
                .await?;

        Ok(rows)
    }
}
