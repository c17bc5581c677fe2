//! Ledger connection administration handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use crate::error::AppError;
use crate::middleware::{require_role, CurrentActor};
use crate::models::ActorRole;
use crate::AppState;

/// Drop the cached ledger connection for a role so the next mirror
/// attempt re-dials (admin only)
pub async fn reset_ledger_connection(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(role): Path<String>,
) -> impl IntoResponse {
    if let Err(e) = require_role(&actor, ActorRole::Admin) {
        return e.into_response();
    }

    let role = match ActorRole::from_str(&role) {
        Some(role) => role,
        None => {
            return AppError::Validation {
                field: "role".to_string(),
                message: format!("Unknown role: {}", role),
            }
            .into_response();
        }
    };

    state.ledger.reset(role).await;
    tracing::info!("Ledger connection for {} reset by admin", role.as_str());

    (
        StatusCode::OK,
        Json(serde_json::json!({ "reset": role.as_str() })),
    )
        .into_response()
}
