//! Batch lifecycle service
//!
//! Owns the canonical batch status. Every transition follows the same
//! shape: resolve the transition from the central table, check the
//! ownership guard, mutate inside one relational transaction, and only
//! after commit hand the accepted transition to the ledger synchronizer.
//! A ledger failure never rolls anything back; the caller just sees a NULL
//! ledger reference.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::WeatherClient;
use crate::ledger::LedgerOp;
use crate::middleware::CurrentActor;
use crate::models::batch::{
    crop_profile, generate_batch_id, transition, Batch, BatchAction, BatchStatus, JourneyEvent,
    OwnerType, Transfer, TransitionGuard,
};
use crate::services::score::ScoreService;
use crate::services::sync::LedgerSync;

/// Batch lifecycle service
#[derive(Clone)]
pub struct BatchService {
    db: PgPool,
    sync: LedgerSync,
    weather: WeatherClient,
    scorer: ScoreService,
}

/// Input for creating a batch
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBatchInput {
    #[validate(length(min = 1, max = 64, message = "Crop must be 1-64 characters"))]
    pub crop: String,
    #[validate(length(max = 128))]
    pub variety: Option<String>,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub harvest_date: Option<NaiveDate>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub evidence_urls: Option<Vec<String>>,
}

/// Input for pickup and receive (location + free text)
#[derive(Debug, Deserialize)]
pub struct CustodyInput {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub notes: Option<String>,
}

/// Input for a transit update
#[derive(Debug, Deserialize)]
pub struct TransitUpdateInput {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub notes: Option<String>,
}

/// Input for delivering a batch
#[derive(Debug, Deserialize)]
pub struct DeliverInput {
    pub retailer_id: Option<Uuid>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub notes: Option<String>,
}

/// Input for marking a batch sold
#[derive(Debug, Deserialize)]
pub struct SellInput {
    pub notes: Option<String>,
}

/// Filters for listing batches
#[derive(Debug, Deserialize)]
pub struct ListBatchesQuery {
    pub status: Option<String>,
    pub crop: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Outcome of an accepted transition
#[derive(Debug, Serialize)]
pub struct TransitionOutcome {
    pub batch_id: String,
    pub status: BatchStatus,
    pub ledger_tx_id: Option<String>,
}

/// Batch row joined with its farmer's identity
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct BatchWithFarmer {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub batch: Batch,
    pub farmer_name: Option<String>,
    pub registry_id: Option<String>,
}

/// Farmer identity block for the public journey view
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct FarmerSummary {
    pub name: String,
    pub registry_id: Option<String>,
    pub verified: bool,
    pub reliability_score: Decimal,
}

/// Complete custody history for a batch
#[derive(Debug, Serialize)]
pub struct JourneyView {
    pub batch: Batch,
    pub farmer: FarmerSummary,
    pub journey: Vec<JourneyEvent>,
    pub transfers: Vec<Transfer>,
}

impl BatchService {
    pub fn new(db: PgPool, sync: LedgerSync, weather: WeatherClient) -> Self {
        let scorer = ScoreService::new(db.clone());
        Self {
            db,
            sync,
            weather,
            scorer,
        }
    }

    /// Create a new batch owned by the acting farmer (status `created`)
    pub async fn create_batch(
        &self,
        actor: &CurrentActor,
        input: CreateBatchInput,
    ) -> AppResult<Batch> {
        input
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;
        if input.crop.trim().is_empty() {
            return Err(AppError::Validation {
                field: "crop".to_string(),
                message: "Crop is required".to_string(),
            });
        }
        if input.quantity <= Decimal::ZERO {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Quantity must be greater than zero".to_string(),
            });
        }

        let farmer = sqlx::query_as::<_, (Uuid, String, Option<String>)>(
            "SELECT id, name, registry_id FROM farmers WHERE user_id = $1",
        )
        .bind(actor.user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Farmer profile".to_string()))?;

        let batch_id = generate_batch_id(&input.crop);
        let profile = crop_profile(&input.crop);
        let unit = input.unit.clone().unwrap_or_else(|| "kg".to_string());
        let harvest_date = input
            .harvest_date
            .unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = self.db.begin().await?;

        let mut batch = sqlx::query_as::<_, Batch>(
            r#"
            INSERT INTO batches (
                batch_id, crop, variety, quantity, unit, harvest_date, farmer_id,
                status, current_owner_type, current_owner_id,
                origin_latitude, origin_longitude, origin_address,
                crate_temp, reefer_temp, humidity, crop_type_code
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'created', 'farmer', $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(&batch_id)
        .bind(input.crop.trim())
        .bind(&input.variety)
        .bind(input.quantity)
        .bind(&unit)
        .bind(harvest_date)
        .bind(farmer.0)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(&input.address)
        .bind(profile.crate_temp)
        .bind(profile.reefer_temp)
        .bind(profile.humidity)
        .bind(profile.code)
        .fetch_one(&mut *tx)
        .await?;

        insert_journey_event(
            &mut tx,
            batch.id,
            "created",
            "farmer",
            farmer.0,
            &farmer.1,
            input.latitude,
            input.longitude,
            input.address.as_deref(),
            None,
            None,
            Some(&format!("Batch created by {}", farmer.1)),
            input.evidence_urls.as_deref(),
        )
        .await?;

        tx.commit().await?;

        let args = vec![
            batch_id.clone(),
            farmer.0.to_string(),
            farmer.1.clone(),
            farmer.2.clone().unwrap_or_default(),
            batch.crop.clone(),
            batch.variety.clone().unwrap_or_default(),
            batch.quantity.to_string(),
            batch.unit.clone(),
            batch.harvest_date.to_string(),
            input.latitude.unwrap_or(0.0).to_string(),
            input.longitude.unwrap_or(0.0).to_string(),
            input.address.clone().unwrap_or_default(),
        ];
        let tx_id = self
            .sync
            .mirror(actor.role, LedgerOp::CreateBatch, args)
            .await;
        if let Some(ref tx_id) = tx_id {
            self.store_ledger_ref(batch.id, tx_id).await?;
            batch.ledger_tx_id = Some(tx_id.clone());
        }

        // Total batch count changed; derived columns follow
        if let Err(e) = self.scorer.recompute(farmer.0).await {
            tracing::warn!("Score recompute after create failed: {}", e);
        }

        Ok(batch)
    }

    /// Driver takes custody from the farmer (`created` -> `in_transit`)
    pub async fn pickup(
        &self,
        batch_id: &str,
        actor: &CurrentActor,
        input: CustodyInput,
    ) -> AppResult<TransitionOutcome> {
        let batch = self.fetch_batch(batch_id).await?;
        self.guard(&batch, BatchAction::Pickup, None)?;

        let (driver_id, driver_name) = self.get_or_create_driver(actor).await?;

        // Ambient temperature at the pickup location becomes the batch
        // default; sampling never fails the transition.
        let location_temp = self
            .weather
            .location_temperature(input.latitude, input.longitude)
            .await;

        let mut tx = self.db.begin().await?;

        // Conditional on the source status: a concurrent transition that
        // committed first makes this a no-op, which rolls back here.
        let updated = sqlx::query(
            r#"
            UPDATE batches
            SET status = 'in_transit', current_owner_type = 'driver', current_owner_id = $1,
                location_temp = $2, transit_start_time = NOW(), updated_at = NOW()
            WHERE id = $3 AND status = 'created'
            "#,
        )
        .bind(driver_id)
        .bind(location_temp)
        .bind(batch.id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            let current = self.current_status(&mut tx, batch.id).await?;
            return Err(stale_transition_error(BatchAction::Pickup, current));
        }

        insert_transfer(
            &mut tx,
            batch.id,
            batch.current_owner_type,
            batch.current_owner_id,
            OwnerType::Driver,
            driver_id,
            input.latitude,
            input.longitude,
            input.notes.as_deref(),
        )
        .await?;

        let notes = input
            .notes
            .clone()
            .unwrap_or_else(|| format!("Picked up by driver {}", driver_name));
        insert_journey_event(
            &mut tx,
            batch.id,
            BatchAction::Pickup.event_type(),
            OwnerType::Driver.as_str(),
            driver_id,
            &driver_name,
            input.latitude,
            input.longitude,
            None,
            None,
            None,
            Some(&notes),
            None,
        )
        .await?;

        tx.commit().await?;

        let args = vec![
            batch.batch_id.clone(),
            driver_name,
            input.latitude.unwrap_or(0.0).to_string(),
            input.longitude.unwrap_or(0.0).to_string(),
            input.notes.unwrap_or_default(),
        ];
        let tx_id = self
            .sync
            .mirror(actor.role, LedgerOp::RecordPickup, args)
            .await;
        if let Some(ref tx_id) = tx_id {
            self.store_ledger_ref(batch.id, tx_id).await?;
        }

        Ok(TransitionOutcome {
            batch_id: batch.batch_id,
            status: BatchStatus::InTransit,
            ledger_tx_id: tx_id,
        })
    }

    /// Owning driver appends an in-transit telemetry event; status unchanged
    pub async fn transit_update(
        &self,
        batch_id: &str,
        actor: &CurrentActor,
        input: TransitUpdateInput,
    ) -> AppResult<TransitionOutcome> {
        let batch = self.fetch_batch(batch_id).await?;
        let (driver_id, driver_name) = self.get_or_create_driver(actor).await?;
        self.guard(&batch, BatchAction::TransitUpdate, Some(driver_id))?;

        let mut tx = self.db.begin().await?;
        insert_journey_event(
            &mut tx,
            batch.id,
            BatchAction::TransitUpdate.event_type(),
            "driver",
            driver_id,
            &driver_name,
            input.latitude,
            input.longitude,
            None,
            input.temperature,
            input.humidity,
            input.notes.as_deref(),
            None,
        )
        .await?;
        tx.commit().await?;

        let args = vec![
            batch.batch_id.clone(),
            driver_name,
            input.latitude.unwrap_or(0.0).to_string(),
            input.longitude.unwrap_or(0.0).to_string(),
            input.temperature.unwrap_or(0.0).to_string(),
            input.humidity.unwrap_or(0.0).to_string(),
            input.notes.unwrap_or_default(),
        ];
        let tx_id = self
            .sync
            .mirror(actor.role, LedgerOp::RecordTransitUpdate, args)
            .await;
        if let Some(ref tx_id) = tx_id {
            self.store_ledger_ref(batch.id, tx_id).await?;
        }

        Ok(TransitionOutcome {
            batch_id: batch.batch_id,
            status: BatchStatus::InTransit,
            ledger_tx_id: tx_id,
        })
    }

    /// Owning driver declares arrival at a designated retailer
    /// (`in_transit` -> `delivered`; custody stays with the driver)
    pub async fn deliver(
        &self,
        batch_id: &str,
        actor: &CurrentActor,
        input: DeliverInput,
    ) -> AppResult<TransitionOutcome> {
        // No destination, no delivery; rejected before any mutation
        let retailer_id = input.retailer_id.ok_or_else(|| AppError::Validation {
            field: "retailer_id".to_string(),
            message: "A destination retailer is required to deliver".to_string(),
        })?;

        let batch = self.fetch_batch(batch_id).await?;
        let (driver_id, driver_name) = self.get_or_create_driver(actor).await?;
        self.guard(&batch, BatchAction::Deliver, Some(driver_id))?;

        let retailer_name =
            sqlx::query_scalar::<_, String>("SELECT name FROM retailers WHERE id = $1")
                .bind(retailer_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Retailer".to_string()))?;

        let transit_duration = batch
            .transit_start_time
            .map(|start| (Utc::now() - start).num_seconds() as f64 / 3600.0);

        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE batches
            SET status = 'delivered', pending_retailer_id = $1,
                transit_end_time = NOW(), transit_duration = $2, updated_at = NOW()
            WHERE id = $3 AND status = 'in_transit'
            "#,
        )
        .bind(retailer_id)
        .bind(transit_duration)
        .bind(batch.id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            let current = self.current_status(&mut tx, batch.id).await?;
            return Err(stale_transition_error(BatchAction::Deliver, current));
        }

        let notes = input
            .notes
            .clone()
            .unwrap_or_else(|| format!("Delivered by driver {}", driver_name));
        insert_journey_event(
            &mut tx,
            batch.id,
            BatchAction::Deliver.event_type(),
            "driver",
            driver_id,
            &driver_name,
            input.latitude,
            input.longitude,
            None,
            None,
            None,
            Some(&notes),
            None,
        )
        .await?;

        tx.commit().await?;

        let args = vec![
            batch.batch_id.clone(),
            driver_name,
            retailer_name,
            input.latitude.unwrap_or(0.0).to_string(),
            input.longitude.unwrap_or(0.0).to_string(),
            input.notes.unwrap_or_default(),
        ];
        let tx_id = self
            .sync
            .mirror(actor.role, LedgerOp::RecordDelivery, args)
            .await;
        if let Some(ref tx_id) = tx_id {
            self.store_ledger_ref(batch.id, tx_id).await?;
        }

        Ok(TransitionOutcome {
            batch_id: batch.batch_id,
            status: BatchStatus::Delivered,
            ledger_tx_id: tx_id,
        })
    }

    /// Retailer takes custody (`delivered` -> `received`). Only the
    /// retailer designated at delivery may receive, when one was set.
    pub async fn receive(
        &self,
        batch_id: &str,
        actor: &CurrentActor,
        input: CustodyInput,
    ) -> AppResult<TransitionOutcome> {
        let batch = self.fetch_batch(batch_id).await?;
        let (retailer_id, retailer_name) = self.get_or_create_retailer(actor).await?;
        self.guard(&batch, BatchAction::Receive, Some(retailer_id))?;

        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE batches
            SET status = 'received', current_owner_type = 'retailer', current_owner_id = $1,
                pending_retailer_id = NULL, updated_at = NOW()
            WHERE id = $2 AND status = 'delivered'
            "#,
        )
        .bind(retailer_id)
        .bind(batch.id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            let current = self.current_status(&mut tx, batch.id).await?;
            return Err(stale_transition_error(BatchAction::Receive, current));
        }

        insert_transfer(
            &mut tx,
            batch.id,
            batch.current_owner_type,
            batch.current_owner_id,
            OwnerType::Retailer,
            retailer_id,
            input.latitude,
            input.longitude,
            input.notes.as_deref(),
        )
        .await?;

        let notes = input
            .notes
            .clone()
            .unwrap_or_else(|| format!("Received by retailer {}", retailer_name));
        insert_journey_event(
            &mut tx,
            batch.id,
            BatchAction::Receive.event_type(),
            "retailer",
            retailer_id,
            &retailer_name,
            input.latitude,
            input.longitude,
            None,
            None,
            None,
            Some(&notes),
            None,
        )
        .await?;

        tx.commit().await?;

        // Receipt is the trust checkpoint; the synchronizer applies its
        // multi-attempt policy to this operation.
        let args = vec![
            batch.batch_id.clone(),
            retailer_name,
            input.latitude.unwrap_or(0.0).to_string(),
            input.longitude.unwrap_or(0.0).to_string(),
            input.notes.unwrap_or_default(),
        ];
        let tx_id = self
            .sync
            .mirror(actor.role, LedgerOp::RecordReceipt, args)
            .await;
        if let Some(ref tx_id) = tx_id {
            self.store_ledger_ref(batch.id, tx_id).await?;
        }

        if let Err(e) = self.scorer.recompute(batch.farmer_id).await {
            tracing::warn!("Score recompute after receive failed: {}", e);
        }

        Ok(TransitionOutcome {
            batch_id: batch.batch_id,
            status: BatchStatus::Received,
            ledger_tx_id: tx_id,
        })
    }

    /// Owning retailer sells the batch (`received` -> `sold`, terminal)
    pub async fn sell(
        &self,
        batch_id: &str,
        actor: &CurrentActor,
        input: SellInput,
    ) -> AppResult<TransitionOutcome> {
        let batch = self.fetch_batch(batch_id).await?;
        let (retailer_id, retailer_name) = self.get_or_create_retailer(actor).await?;
        self.guard(&batch, BatchAction::Sell, Some(retailer_id))?;

        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            "UPDATE batches SET status = 'sold', updated_at = NOW() \
             WHERE id = $1 AND status = 'received'",
        )
        .bind(batch.id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            let current = self.current_status(&mut tx, batch.id).await?;
            return Err(stale_transition_error(BatchAction::Sell, current));
        }

        let notes = input
            .notes
            .clone()
            .unwrap_or_else(|| format!("Sold by {}", retailer_name));
        insert_journey_event(
            &mut tx,
            batch.id,
            BatchAction::Sell.event_type(),
            "retailer",
            retailer_id,
            &retailer_name,
            None,
            None,
            None,
            None,
            None,
            Some(&notes),
            None,
        )
        .await?;

        tx.commit().await?;

        let args = vec![
            batch.batch_id.clone(),
            retailer_name,
            input.notes.unwrap_or_default(),
        ];
        let tx_id = self
            .sync
            .mirror(actor.role, LedgerOp::RecordSale, args)
            .await;
        if let Some(ref tx_id) = tx_id {
            self.store_ledger_ref(batch.id, tx_id).await?;
        }

        if let Err(e) = self.scorer.recompute(batch.farmer_id).await {
            tracing::warn!("Score recompute after sale failed: {}", e);
        }

        Ok(TransitionOutcome {
            batch_id: batch.batch_id,
            status: BatchStatus::Sold,
            ledger_tx_id: tx_id,
        })
    }

    /// Single batch with farmer identity
    pub async fn get_batch(&self, batch_id: &str) -> AppResult<BatchWithFarmer> {
        sqlx::query_as::<_, BatchWithFarmer>(
            r#"
            SELECT b.*, f.name AS farmer_name, f.registry_id
            FROM batches b
            LEFT JOIN farmers f ON b.farmer_id = f.id
            WHERE b.batch_id = $1
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))
    }

    /// Complete journey: batch, farmer block, events, custody transfers
    pub async fn get_journey(&self, batch_id: &str) -> AppResult<JourneyView> {
        let batch = self.fetch_batch(batch_id).await?;

        let farmer = sqlx::query_as::<_, FarmerSummary>(
            "SELECT name, registry_id, verified, reliability_score FROM farmers WHERE id = $1",
        )
        .bind(batch.farmer_id)
        .fetch_one(&self.db)
        .await?;

        let journey = sqlx::query_as::<_, JourneyEvent>(
            "SELECT * FROM journey_events WHERE batch_id = $1 ORDER BY created_at ASC",
        )
        .bind(batch.id)
        .fetch_all(&self.db)
        .await?;

        let transfers = sqlx::query_as::<_, Transfer>(
            "SELECT * FROM transfers WHERE batch_id = $1 ORDER BY transfer_date ASC",
        )
        .bind(batch.id)
        .fetch_all(&self.db)
        .await?;

        Ok(JourneyView {
            batch,
            farmer,
            journey,
            transfers,
        })
    }

    /// Role-scoped batch listing: farmers see their own, drivers see what
    /// they hold plus what is available, retailers see what they hold plus
    /// what awaits receipt, admins see everything.
    pub async fn list_batches(
        &self,
        actor: &CurrentActor,
        query: ListBatchesQuery,
    ) -> AppResult<Vec<BatchWithFarmer>> {
        let profile_id = self.profile_id_for(actor).await?;
        let limit = query.limit.unwrap_or(50).clamp(1, 200);
        let offset = query.offset.unwrap_or(0).max(0);
        let crop_pattern = query.crop.map(|c| format!("%{}%", c));

        let rows = sqlx::query_as::<_, BatchWithFarmer>(
            r#"
            SELECT b.*, f.name AS farmer_name, f.registry_id
            FROM batches b
            LEFT JOIN farmers f ON b.farmer_id = f.id
            WHERE ($1::varchar IS NULL OR b.status = $1)
              AND ($2::varchar IS NULL OR b.crop ILIKE $2)
              AND (CASE $3::varchar
                   WHEN 'farmer' THEN b.farmer_id = $4
                   WHEN 'driver' THEN (b.current_owner_type = 'driver' AND b.current_owner_id = $4)
                                      OR b.status IN ('created', 'in_transit')
                   WHEN 'retailer' THEN (b.current_owner_type = 'retailer' AND b.current_owner_id = $4)
                                        OR b.status = 'delivered'
                   ELSE TRUE
                   END)
            ORDER BY b.created_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(&query.status)
        .bind(&crop_pattern)
        .bind(actor.role.as_str())
        .bind(profile_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    async fn fetch_batch(&self, batch_id: &str) -> AppResult<Batch> {
        sqlx::query_as::<_, Batch>("SELECT * FROM batches WHERE batch_id = $1")
            .bind(batch_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Batch".to_string()))
    }

    /// Resolve the requested action against the transition table and check
    /// its ownership guard. `actor_profile_id` is the acting party's
    /// profile id for owner-bound guards.
    fn guard(
        &self,
        batch: &Batch,
        action: BatchAction,
        actor_profile_id: Option<Uuid>,
    ) -> AppResult<()> {
        let status = batch.status_enum().ok_or_else(|| {
            AppError::Internal(format!("Batch {} has unknown status", batch.batch_id))
        })?;

        let resolved = transition(status, action).ok_or_else(|| AppError::GuardViolation {
            message: rejection_message(action).to_string(),
            current_status: batch.status.clone(),
        })?;

        match resolved.guard {
            TransitionGuard::None => Ok(()),
            TransitionGuard::OwningDriver => {
                let ok = batch.current_owner_type == OwnerType::Driver
                    && actor_profile_id == Some(batch.current_owner_id);
                if ok {
                    Ok(())
                } else {
                    Err(AppError::GuardViolation {
                        message: "Batch is not in your possession".to_string(),
                        current_status: batch.status.clone(),
                    })
                }
            }
            TransitionGuard::DesignatedRetailer => match batch.pending_retailer_id {
                Some(pending) if actor_profile_id != Some(pending) => {
                    Err(AppError::GuardViolation {
                        message: "Batch was designated to a different retailer".to_string(),
                        current_status: batch.status.clone(),
                    })
                }
                _ => Ok(()),
            },
            TransitionGuard::OwningRetailer => {
                let ok = batch.current_owner_type == OwnerType::Retailer
                    && actor_profile_id == Some(batch.current_owner_id);
                if ok {
                    Ok(())
                } else {
                    Err(AppError::GuardViolation {
                        message: "Batch is not in your possession".to_string(),
                        current_status: batch.status.clone(),
                    })
                }
            }
        }
    }

    /// Status as it stands inside the open transaction, after a conditional
    /// transition write matched no row
    async fn current_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        batch_uuid: Uuid,
    ) -> AppResult<String> {
        Ok(
            sqlx::query_scalar::<_, String>("SELECT status FROM batches WHERE id = $1")
                .bind(batch_uuid)
                .fetch_one(&mut **tx)
                .await?,
        )
    }

    async fn store_ledger_ref(&self, batch_uuid: Uuid, tx_id: &str) -> AppResult<()> {
        sqlx::query("UPDATE batches SET ledger_tx_id = $1 WHERE id = $2")
            .bind(tx_id)
            .bind(batch_uuid)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn get_or_create_driver(&self, actor: &CurrentActor) -> AppResult<(Uuid, String)> {
        if let Some(row) =
            sqlx::query_as::<_, (Uuid, String)>("SELECT id, name FROM drivers WHERE user_id = $1")
                .bind(actor.user_id)
                .fetch_optional(&self.db)
                .await?
        {
            return Ok(row);
        }

        let row = sqlx::query_as::<_, (Uuid, String)>(
            "INSERT INTO drivers (user_id, name, phone) VALUES ($1, $2, $3) RETURNING id, name",
        )
        .bind(actor.user_id)
        .bind(&actor.name)
        .bind(&actor.phone)
        .fetch_one(&self.db)
        .await?;

        Ok(row)
    }

    async fn get_or_create_retailer(&self, actor: &CurrentActor) -> AppResult<(Uuid, String)> {
        if let Some(row) = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, name FROM retailers WHERE user_id = $1",
        )
        .bind(actor.user_id)
        .fetch_optional(&self.db)
        .await?
        {
            return Ok(row);
        }

        let row = sqlx::query_as::<_, (Uuid, String)>(
            "INSERT INTO retailers (user_id, name, phone) VALUES ($1, $2, $3) RETURNING id, name",
        )
        .bind(actor.user_id)
        .bind(&actor.name)
        .bind(&actor.phone)
        .fetch_one(&self.db)
        .await?;

        Ok(row)
    }

    async fn profile_id_for(&self, actor: &CurrentActor) -> AppResult<Option<Uuid>> {
        let sql = match actor.role {
            crate::models::ActorRole::Farmer => "SELECT id FROM farmers WHERE user_id = $1",
            crate::models::ActorRole::Driver => "SELECT id FROM drivers WHERE user_id = $1",
            crate::models::ActorRole::Retailer => "SELECT id FROM retailers WHERE user_id = $1",
            crate::models::ActorRole::Admin => return Ok(None),
        };

        Ok(sqlx::query_scalar::<_, Uuid>(sql)
            .bind(actor.user_id)
            .fetch_optional(&self.db)
            .await?)
    }
}

/// Guard violation for a transition whose conditional write matched no row:
/// the batch left the source status after the guard check, so the action is
/// rejected against the status another writer committed.
pub fn stale_transition_error(action: BatchAction, current_status: String) -> AppError {
    AppError::GuardViolation {
        message: rejection_message(action).to_string(),
        current_status,
    }
}

/// Client-facing rejection text for an action attempted from the wrong status
fn rejection_message(action: BatchAction) -> &'static str {
    match action {
        BatchAction::Pickup => "Batch cannot be picked up in its current status",
        BatchAction::TransitUpdate => "Batch must be in transit to record a transit update",
        BatchAction::Deliver => "Batch must be in transit to deliver",
        BatchAction::Receive => "Batch must be delivered before it can be received",
        BatchAction::Sell => "Batch must be received before selling",
    }
}

#[allow(clippy::too_many_arguments)]
async fn insert_journey_event(
    tx: &mut Transaction<'_, Postgres>,
    batch_uuid: Uuid,
    event_type: &str,
    actor_type: &str,
    actor_id: Uuid,
    actor_name: &str,
    latitude: Option<f64>,
    longitude: Option<f64>,
    address: Option<&str>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    notes: Option<&str>,
    evidence_urls: Option<&[String]>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO journey_events (
            batch_id, event_type, actor_type, actor_id, actor_name,
            latitude, longitude, address, temperature, humidity, notes, evidence_urls
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(batch_uuid)
    .bind(event_type)
    .bind(actor_type)
    .bind(actor_id)
    .bind(actor_name)
    .bind(latitude)
    .bind(longitude)
    .bind(address)
    .bind(temperature)
    .bind(humidity)
    .bind(notes)
    .bind(evidence_urls)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn insert_transfer(
    tx: &mut Transaction<'_, Postgres>,
    batch_uuid: Uuid,
    from_type: OwnerType,
    from_id: Uuid,
    to_type: OwnerType,
    to_id: Uuid,
    latitude: Option<f64>,
    longitude: Option<f64>,
    notes: Option<&str>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transfers (batch_id, from_type, from_id, to_type, to_id, latitude, longitude, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(batch_uuid)
    .bind(from_type)
    .bind(from_id)
    .bind(to_type)
    .bind(to_id)
    .bind(latitude)
    .bind(longitude)
    .bind(notes)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
