//! Farmer reliability scoring
//!
//! The score is always derivable purely from the farmer's batch rows:
//! `(successful / total) * 100`, +5 for registry-verified farmers, capped
//! at 100. Farmers with no batches keep the 50.00 default. Recomputation is
//! idempotent and runs after creation, receipt and sale.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Default score for farmers with no batch history
pub const DEFAULT_SCORE: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Flat bonus for registry-verified farmers
const VERIFIED_BONUS: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

const MAX_SCORE: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

/// Compute the reliability score from batch counters.
///
/// Pure so the formula is testable without a database; the service wraps it
/// with the counting query and the write-back.
pub fn reliability_score(total: i64, successful: i64, verified: bool) -> Decimal {
    if total == 0 {
        return DEFAULT_SCORE;
    }

    let mut score = Decimal::from(successful) / Decimal::from(total) * MAX_SCORE;
    if verified {
        score = (score + VERIFIED_BONUS).min(MAX_SCORE);
    }

    score.round_dp(2)
}

/// Reliability scorer service
#[derive(Clone)]
pub struct ScoreService {
    db: PgPool,
}

impl ScoreService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Recompute and persist one farmer's score and counters
    pub async fn recompute(&self, farmer_id: Uuid) -> AppResult<Decimal> {
        let verified = sqlx::query_scalar::<_, bool>("SELECT verified FROM farmers WHERE id = $1")
            .bind(farmer_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Farmer".to_string()))?;

        let (total, successful) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE status IN ('received', 'sold'))
            FROM batches
            WHERE farmer_id = $1
            "#,
        )
        .bind(farmer_id)
        .fetch_one(&self.db)
        .await?;

        let score = reliability_score(total, successful, verified);

        sqlx::query(
            r#"
            UPDATE farmers
            SET reliability_score = $1, total_batches = $2, successful_batches = $3
            WHERE id = $4
            "#,
        )
        .bind(score)
        .bind(total as i32)
        .bind(successful as i32)
        .bind(farmer_id)
        .execute(&self.db)
        .await?;

        tracing::info!(
            "Recomputed farmer {} score: {} ({}/{} successful)",
            farmer_id,
            score,
            successful,
            total
        );

        Ok(score)
    }

    /// Recompute every farmer; admin maintenance sweep
    pub async fn recompute_all(&self) -> AppResult<u64> {
        let farmer_ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM farmers")
            .fetch_all(&self.db)
            .await?;

        let mut updated = 0;
        for farmer_id in farmer_ids {
            self.recompute(farmer_id).await?;
            updated += 1;
        }

        Ok(updated)
    }
}
