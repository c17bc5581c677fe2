//! Integrity verification HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::services::IntegrityService;
use crate::AppState;

/// Cross-check a batch against its ledger record (public endpoint)
pub async fn verify_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> impl IntoResponse {
    let service = IntegrityService::new(state.db.clone(), state.ledger.clone());

    match service.verify(&batch_id).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => e.into_response(),
    }
}
