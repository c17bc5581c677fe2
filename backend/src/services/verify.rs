//! Integrity verification
//!
//! Cross-checks a batch's relational record against its ledger record.
//! Verification is read-only and public: a missing ledger reference, an
//! absent ledger record, or an unreachable network all produce a report
//! with discrepancies, never a request failure.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::ledger::{LedgerGateway, LedgerOp};
use crate::models::batch::Batch;
use crate::models::ActorRole;

/// One field that disagrees between the two records
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Discrepancy {
    pub field: String,
    pub relational: String,
    pub ledger: String,
}

/// Outcome of one verification pass
#[derive(Debug, Serialize)]
pub struct VerificationReport {
    pub batch_id: String,
    pub verified: bool,
    pub ledger_present: bool,
    pub discrepancies: Vec<Discrepancy>,
    pub checked_at: DateTime<Utc>,
}

impl VerificationReport {
    fn absent(batch_id: String, reason: &str) -> Self {
        Self {
            batch_id,
            verified: false,
            ledger_present: false,
            discrepancies: vec![Discrepancy {
                field: "ledger_record".to_string(),
                relational: "present".to_string(),
                ledger: reason.to_string(),
            }],
            checked_at: Utc::now(),
        }
    }
}

/// Ledger/relational cross-checker
#[derive(Clone)]
pub struct IntegrityService {
    db: PgPool,
    gateway: Arc<LedgerGateway>,
}

impl IntegrityService {
    pub fn new(db: PgPool, gateway: Arc<LedgerGateway>) -> Self {
        Self { db, gateway }
    }

    /// Verify one batch against the ledger. Queries go through the
    /// regulator organization, which has read access to every batch.
    pub async fn verify(&self, batch_id: &str) -> AppResult<VerificationReport> {
        let batch = sqlx::query_as::<_, Batch>("SELECT * FROM batches WHERE batch_id = $1")
            .bind(batch_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Batch".to_string()))?;

        let farmer_name = sqlx::query_scalar::<_, String>("SELECT name FROM farmers WHERE id = $1")
            .bind(batch.farmer_id)
            .fetch_optional(&self.db)
            .await?;

        if batch.ledger_tx_id.is_none() {
            return Ok(VerificationReport::absent(
                batch.batch_id,
                "no ledger transaction reference",
            ));
        }

        let client = match self.gateway.client_for(ActorRole::Admin).await {
            Some(client) => client,
            None => {
                return Ok(VerificationReport::absent(
                    batch.batch_id,
                    "ledger network unavailable",
                ));
            }
        };

        let raw = match client
            .query(LedgerOp::GetBatch, &[batch.batch_id.clone()])
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Ledger query for {} failed: {}", batch.batch_id, e);
                return Ok(VerificationReport::absent(
                    batch.batch_id,
                    "ledger query failed",
                ));
            }
        };

        let record: Value = match serde_json::from_slice(&raw) {
            Ok(Value::Null) => {
                return Ok(VerificationReport::absent(
                    batch.batch_id,
                    "no record on ledger",
                ));
            }
            Ok(record) => record,
            Err(_) => {
                return Ok(VerificationReport::absent(
                    batch.batch_id,
                    "unreadable ledger record",
                ));
            }
        };

        let discrepancies = compare_records(&batch, farmer_name.as_deref(), &record);
        Ok(VerificationReport {
            batch_id: batch.batch_id,
            verified: discrepancies.is_empty(),
            ledger_present: true,
            discrepancies,
            checked_at: Utc::now(),
        })
    }
}

/// Field-by-field comparison of the relational batch against the ledger
/// record. Ledger fields are camelCase JSON written by the chaincode; a
/// field absent from the ledger record is only flagged for status, which
/// every record must carry.
pub fn compare_records(
    batch: &Batch,
    farmer_name: Option<&str>,
    record: &Value,
) -> Vec<Discrepancy> {
    let mut discrepancies = Vec::new();

    let ledger_str = |key: &str| record.get(key).and_then(Value::as_str);

    match ledger_str("status") {
        Some(status) if status != batch.status => discrepancies.push(Discrepancy {
            field: "status".to_string(),
            relational: batch.status.clone(),
            ledger: status.to_string(),
        }),
        Some(_) => {}
        None => discrepancies.push(Discrepancy {
            field: "status".to_string(),
            relational: batch.status.clone(),
            ledger: "(missing)".to_string(),
        }),
    }

    if let Some(crop) = ledger_str("crop") {
        if !crop.eq_ignore_ascii_case(&batch.crop) {
            discrepancies.push(Discrepancy {
                field: "crop".to_string(),
                relational: batch.crop.clone(),
                ledger: crop.to_string(),
            });
        }
    }

    if let Some(variety) = ledger_str("variety") {
        let relational = batch.variety.as_deref().unwrap_or("");
        if !variety.eq_ignore_ascii_case(relational) {
            discrepancies.push(Discrepancy {
                field: "variety".to_string(),
                relational: relational.to_string(),
                ledger: variety.to_string(),
            });
        }
    }

    // The chaincode stores quantity as a JSON number; older records and
    // some gateways relay it as a string. Both forms are compared as decimals.
    let ledger_quantity = match record.get("quantity") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    if let Some(quantity) = ledger_quantity {
        let matches = quantity
            .parse::<rust_decimal::Decimal>()
            .map(|q| q == batch.quantity)
            .unwrap_or(false);
        if !matches {
            discrepancies.push(Discrepancy {
                field: "quantity".to_string(),
                relational: batch.quantity.to_string(),
                ledger: quantity,
            });
        }
    }

    if let Some(unit) = ledger_str("unit") {
        if unit != batch.unit {
            discrepancies.push(Discrepancy {
                field: "unit".to_string(),
                relational: batch.unit.clone(),
                ledger: unit.to_string(),
            });
        }
    }

    if let (Some(ledger_farmer), Some(relational_farmer)) =
        (ledger_str("farmerName"), farmer_name)
    {
        if !ledger_farmer.eq_ignore_ascii_case(relational_farmer) {
            discrepancies.push(Discrepancy {
                field: "farmer_name".to_string(),
                relational: relational_farmer.to_string(),
                ledger: ledger_farmer.to_string(),
            });
        }
    }

    // The ledger record carries the submitting organization, not a party
    // type; the relational owner type maps onto it one-to-one.
    if let Some(org) = ledger_str("currentOrg") {
        let expected = batch.current_owner_type.ledger_org();
        if org != expected {
            discrepancies.push(Discrepancy {
                field: "current_org".to_string(),
                relational: expected.to_string(),
                ledger: org.to_string(),
            });
        }
    }

    discrepancies
}
