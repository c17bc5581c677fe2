//! Farmer profile and reliability score handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::{require_role, CurrentActor};
use crate::models::{ActorRole, Farmer};
use crate::services::ScoreService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UpsertFarmerInput {
    pub name: Option<String>,
    pub registry_id: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
    pub land_acres: Option<Decimal>,
    pub primary_crop: Option<String>,
}

/// Create or update the acting farmer's profile
pub async fn upsert_my_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Json(input): Json<UpsertFarmerInput>,
) -> impl IntoResponse {
    if let Err(e) = require_role(&actor, ActorRole::Farmer) {
        return e.into_response();
    }

    let name = input.name.unwrap_or_else(|| actor.name.clone());

    let result = sqlx::query_as::<_, Farmer>(
        r#"
        INSERT INTO farmers (user_id, name, phone, registry_id, district, state, land_acres, primary_crop)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (user_id)
        DO UPDATE SET
            name = EXCLUDED.name,
            phone = EXCLUDED.phone,
            registry_id = COALESCE(EXCLUDED.registry_id, farmers.registry_id),
            district = COALESCE(EXCLUDED.district, farmers.district),
            state = COALESCE(EXCLUDED.state, farmers.state),
            land_acres = COALESCE(EXCLUDED.land_acres, farmers.land_acres),
            primary_crop = COALESCE(EXCLUDED.primary_crop, farmers.primary_crop)
        RETURNING *
        "#,
    )
    .bind(actor.user_id)
    .bind(&name)
    .bind(&actor.phone)
    .bind(&input.registry_id)
    .bind(&input.district)
    .bind(&input.state)
    .bind(input.land_acres)
    .bind(&input.primary_crop)
    .fetch_one(&state.db)
    .await;

    match result {
        Ok(farmer) => (StatusCode::OK, Json(farmer)).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Get the acting farmer's profile
pub async fn get_my_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
) -> impl IntoResponse {
    if let Err(e) = require_role(&actor, ActorRole::Farmer) {
        return e.into_response();
    }

    let result = sqlx::query_as::<_, Farmer>("SELECT * FROM farmers WHERE user_id = $1")
        .bind(actor.user_id)
        .fetch_optional(&state.db)
        .await;

    match result {
        Ok(Some(farmer)) => (StatusCode::OK, Json(farmer)).into_response(),
        Ok(None) => AppError::NotFound("Farmer profile".to_string()).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Public farmer summary shown on the consumer journey page
pub async fn get_farmer(
    State(state): State<AppState>,
    Path(farmer_id): Path<Uuid>,
) -> impl IntoResponse {
    let result = sqlx::query_as::<_, (String, Option<String>, bool, Decimal, i32)>(
        r#"
        SELECT name, district, verified, reliability_score, total_batches
        FROM farmers WHERE id = $1
        "#,
    )
    .bind(farmer_id)
    .fetch_optional(&state.db)
    .await;

    match result {
        Ok(Some((name, district, verified, reliability_score, total_batches))) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "name": name,
                "district": district,
                "verified": verified,
                "reliability_score": reliability_score,
                "total_batches": total_batches,
            })),
        )
            .into_response(),
        Ok(None) => AppError::NotFound("Farmer".to_string()).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Recompute one farmer's reliability score (admin only)
pub async fn recompute_score(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(farmer_id): Path<Uuid>,
) -> impl IntoResponse {
    if let Err(e) = require_role(&actor, ActorRole::Admin) {
        return e.into_response();
    }

    let service = ScoreService::new(state.db.clone());

    match service.recompute(farmer_id).await {
        Ok(score) => (
            StatusCode::OK,
            Json(serde_json::json!({ "farmer_id": farmer_id, "reliability_score": score })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Recompute every farmer's reliability score (admin only)
pub async fn recompute_all_scores(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
) -> impl IntoResponse {
    if let Err(e) = require_role(&actor, ActorRole::Admin) {
        return e.into_response();
    }

    let service = ScoreService::new(state.db.clone());

    match service.recompute_all().await {
        Ok(updated) => {
            (StatusCode::OK, Json(serde_json::json!({ "updated": updated }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}
