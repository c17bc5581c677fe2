//! Farmer profile model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Farmer profile with derived reliability metrics.
///
/// `reliability_score`, `total_batches` and `successful_batches` are derived
/// by the scorer from the farmer's batch rows and are never hand-edited.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Farmer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub registry_id: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
    pub land_acres: Option<Decimal>,
    pub primary_crop: Option<String>,
    pub verified: bool,
    pub reliability_score: Decimal,
    pub total_batches: i32,
    pub successful_batches: i32,
    pub created_at: DateTime<Utc>,
}
