//! Batch lifecycle HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use crate::middleware::{require_role, CurrentActor};
use crate::models::ActorRole;
use crate::services::batch::{
    BatchService, CreateBatchInput, CustodyInput, DeliverInput, ListBatchesQuery, SellInput,
    TransitUpdateInput,
};
use crate::AppState;

fn batch_service(state: &AppState) -> BatchService {
    BatchService::new(
        state.db.clone(),
        crate::services::LedgerSync::new(state.ledger.clone()),
        state.weather.clone(),
    )
}

/// Register a new batch (farmer only)
pub async fn create_batch(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Json(input): Json<CreateBatchInput>,
) -> impl IntoResponse {
    if let Err(e) = require_role(&actor, ActorRole::Farmer) {
        return e.into_response();
    }

    match batch_service(&state).create_batch(&actor, input).await {
        Ok(batch) => (StatusCode::CREATED, Json(batch)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// List batches visible to the current actor
pub async fn list_batches(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Query(query): Query<ListBatchesQuery>,
) -> impl IntoResponse {
    match batch_service(&state).list_batches(&actor, query).await {
        Ok(batches) => {
            (StatusCode::OK, Json(serde_json::json!({ "batches": batches }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Get one batch with farmer identity
pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> impl IntoResponse {
    match batch_service(&state).get_batch(&batch_id).await {
        Ok(batch) => (StatusCode::OK, Json(batch)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Driver picks up a batch from the farmer
pub async fn pickup_batch(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(batch_id): Path<String>,
    Json(input): Json<CustodyInput>,
) -> impl IntoResponse {
    if let Err(e) = require_role(&actor, ActorRole::Driver) {
        return e.into_response();
    }

    match batch_service(&state).pickup(&batch_id, &actor, input).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Driver records an in-transit update
pub async fn transit_update(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(batch_id): Path<String>,
    Json(input): Json<TransitUpdateInput>,
) -> impl IntoResponse {
    if let Err(e) = require_role(&actor, ActorRole::Driver) {
        return e.into_response();
    }

    match batch_service(&state)
        .transit_update(&batch_id, &actor, input)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Driver declares arrival at a retailer
pub async fn deliver_batch(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(batch_id): Path<String>,
    Json(input): Json<DeliverInput>,
) -> impl IntoResponse {
    if let Err(e) = require_role(&actor, ActorRole::Driver) {
        return e.into_response();
    }

    match batch_service(&state).deliver(&batch_id, &actor, input).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Retailer confirms receipt of a delivered batch
pub async fn receive_batch(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(batch_id): Path<String>,
    Json(input): Json<CustodyInput>,
) -> impl IntoResponse {
    if let Err(e) = require_role(&actor, ActorRole::Retailer) {
        return e.into_response();
    }

    match batch_service(&state).receive(&batch_id, &actor, input).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Retailer marks a received batch as sold
pub async fn sell_batch(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(batch_id): Path<String>,
    Json(input): Json<SellInput>,
) -> impl IntoResponse {
    if let Err(e) = require_role(&actor, ActorRole::Retailer) {
        return e.into_response();
    }

    match batch_service(&state).sell(&batch_id, &actor, input).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Public journey view for QR code scanning
pub async fn get_journey(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> impl IntoResponse {
    match batch_service(&state).get_journey(&batch_id).await {
        Ok(journey) => (StatusCode::OK, Json(journey)).into_response(),
        Err(e) => e.into_response(),
    }
}
