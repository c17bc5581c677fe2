//! Ledger synchronizer
//!
//! Mirrors each accepted state transition onto the ledger network after the
//! relational transaction has committed. Mirroring is strictly best-effort:
//! failures are logged and swallowed, and the caller records a NULL ledger
//! reference. Retry policy is data, resolved per operation — receipt is the
//! customer-facing trust checkpoint and gets three attempts, everything
//! else gets one.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::ledger::{LedgerClient, LedgerGateway, LedgerOp};
use crate::models::ActorRole;

/// Bounded retry policy for one ledger operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn single() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// Retry policy for a mirrored operation
pub fn policy_for(op: LedgerOp) -> RetryPolicy {
    match op {
        LedgerOp::RecordReceipt => RetryPolicy::fixed(3, Duration::from_secs(2)),
        _ => RetryPolicy::single(),
    }
}

/// Submit with bounded retry under the given policy
pub async fn submit_with_retry(
    client: &dyn LedgerClient,
    op: LedgerOp,
    args: &[String],
    policy: RetryPolicy,
) -> AppResult<String> {
    let mut last_err = None;

    for attempt in 1..=policy.max_attempts {
        match client.submit(op, args).await {
            Ok(tx_id) => return Ok(tx_id),
            Err(e) => {
                tracing::warn!(
                    "Ledger {} attempt {}/{} failed: {}",
                    op.as_str(),
                    attempt,
                    policy.max_attempts,
                    e
                );
                last_err = Some(e);
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| AppError::LedgerUnavailable("retry policy made no attempts".into())))
}

/// Best-effort transition mirroring against the shared ledger gateway
#[derive(Clone)]
pub struct LedgerSync {
    gateway: Arc<LedgerGateway>,
}

impl LedgerSync {
    pub fn new(gateway: Arc<LedgerGateway>) -> Self {
        Self { gateway }
    }

    /// Attempt exactly one mapped ledger operation for an accepted
    /// transition. Returns the transaction id on success and `None` on any
    /// failure; never propagates an error to the caller.
    pub async fn mirror(&self, role: ActorRole, op: LedgerOp, args: Vec<String>) -> Option<String> {
        debug_assert!(!op.is_query(), "mirror takes submit operations only");

        let client = match self.gateway.client_for(role).await {
            Some(client) => client,
            None => {
                tracing::warn!(
                    "Ledger not available for {}, skipping {} mirror",
                    role.as_str(),
                    op.as_str()
                );
                return None;
            }
        };

        match submit_with_retry(client.as_ref(), op, &args, policy_for(op)).await {
            Ok(tx_id) => {
                tracing::info!("Mirrored {} on ledger: {}", op.as_str(), tx_id);
                Some(tx_id)
            }
            Err(e) => {
                tracing::warn!(
                    "Ledger mirror {} failed, continuing with relational record only: {}",
                    op.as_str(),
                    e
                );
                None
            }
        }
    }
}
