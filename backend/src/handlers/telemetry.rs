//! IoT telemetry HTTP handlers
//!
//! Ingestion is called by field devices over a private network segment and
//! carries no user JWT; read endpoints for dashboards are authenticated.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::{require_role, CurrentActor};
use crate::models::ActorRole;
use crate::services::telemetry::{IngestInput, Metric, TelemetryService, WindowQuery};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReadingsQuery {
    pub limit: Option<i64>,
}

/// Ingest one sensor reading
pub async fn ingest_reading(
    State(state): State<AppState>,
    Json(input): Json<IngestInput>,
) -> impl IntoResponse {
    let service = TelemetryService::new(state.db.clone());

    match service.ingest(input).await {
        Ok(reading) => (StatusCode::CREATED, Json(reading)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Recent readings for a batch
pub async fn get_readings(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
    Query(query): Query<ReadingsQuery>,
) -> impl IntoResponse {
    let service = TelemetryService::new(state.db.clone());

    match service.readings(&batch_id, query.limit.unwrap_or(100)).await {
        Ok(readings) => {
            (StatusCode::OK, Json(serde_json::json!({ "readings": readings }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Latest reading per device role
pub async fn get_latest_readings(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> impl IntoResponse {
    let service = TelemetryService::new(state.db.clone());

    match service.latest_per_role(&batch_id).await {
        Ok(readings) => {
            (StatusCode::OK, Json(serde_json::json!({ "latest": readings }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Most recent position fix for a batch
pub async fn get_latest_location(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> impl IntoResponse {
    let service = TelemetryService::new(state.db.clone());

    match service.latest_location(&batch_id).await {
        Ok(location) => {
            (StatusCode::OK, Json(serde_json::json!({ "location": location }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Most recent reading for a device role, across batches
pub async fn get_latest_for_role(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> impl IntoResponse {
    let service = TelemetryService::new(state.db.clone());

    match service.latest_for_role(&role).await {
        Ok(reading) => {
            (StatusCode::OK, Json(serde_json::json!({ "latest": reading }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Windowed mean of one metric for a batch
pub async fn get_metric_average(
    State(state): State<AppState>,
    Path((batch_id, metric)): Path<(String, String)>,
    Query(window): Query<WindowQuery>,
) -> impl IntoResponse {
    metric_average(state, Some(batch_id), metric, window).await
}

/// Windowed mean of one metric across every device
pub async fn get_fleet_metric_average(
    State(state): State<AppState>,
    Path(metric): Path<String>,
    Query(window): Query<WindowQuery>,
) -> impl IntoResponse {
    metric_average(state, None, metric, window).await
}

async fn metric_average(
    state: AppState,
    batch_id: Option<String>,
    metric: String,
    window: WindowQuery,
) -> axum::response::Response {
    let metric = match Metric::from_str(&metric) {
        Some(metric) => metric,
        None => {
            return AppError::Validation {
                field: "metric".to_string(),
                message: format!("Unknown metric: {}", metric),
            }
            .into_response();
        }
    };

    let service = TelemetryService::new(state.db.clone());

    match service.average(batch_id.as_deref(), metric, &window).await {
        Ok(mean) => (
            StatusCode::OK,
            Json(serde_json::json!({ "batch_id": batch_id, "average": mean })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Windowed telemetry averages for a batch
pub async fn get_averages(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
    Query(window): Query<WindowQuery>,
) -> impl IntoResponse {
    let service = TelemetryService::new(state.db.clone());

    match service.averages(Some(&batch_id), window).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Windowed telemetry averages across every device
pub async fn get_fleet_averages(
    State(state): State<AppState>,
    Query(window): Query<WindowQuery>,
) -> impl IntoResponse {
    let service = TelemetryService::new(state.db.clone());

    match service.averages(None, window).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// List known devices (admin only)
pub async fn list_devices(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
) -> impl IntoResponse {
    if let Err(e) = require_role(&actor, ActorRole::Admin) {
        return e.into_response();
    }

    let service = TelemetryService::new(state.db.clone());

    match service.devices().await {
        Ok(devices) => {
            (StatusCode::OK, Json(serde_json::json!({ "devices": devices }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}
