//! Ledger operations and the gateway-backed client
//!
//! `LedgerClient` is the seam the rest of the system depends on; tests
//! substitute fakes, production uses `GatewayLedgerClient` speaking JSON to
//! a ledger gateway sidecar.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};

/// Named chaincode operation on the ledger network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LedgerOp {
    CreateBatch,
    RecordPickup,
    RecordTransitUpdate,
    RecordDelivery,
    RecordReceipt,
    RecordSale,
    GetBatch,
}

impl LedgerOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerOp::CreateBatch => "CreateBatch",
            LedgerOp::RecordPickup => "RecordPickup",
            LedgerOp::RecordTransitUpdate => "RecordTransitUpdate",
            LedgerOp::RecordDelivery => "RecordDelivery",
            LedgerOp::RecordReceipt => "RecordReceipt",
            LedgerOp::RecordSale => "RecordSale",
            LedgerOp::GetBatch => "GetBatch",
        }
    }

    /// Query operations evaluate without producing a transaction
    pub fn is_query(&self) -> bool {
        matches!(self, LedgerOp::GetBatch)
    }
}

/// Connection to the ledger network for one organizational identity
#[axum::async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit a transaction; returns the ledger transaction id
    async fn submit(&self, op: LedgerOp, args: &[String]) -> AppResult<String>;

    /// Evaluate a query; returns the raw record bytes
    async fn query(&self, op: LedgerOp, args: &[String]) -> AppResult<Vec<u8>>;
}

#[derive(Serialize)]
struct GatewayRequest<'a> {
    channel: &'a str,
    chaincode: &'a str,
    org: &'a str,
    operation: &'a str,
    args: &'a [String],
}

#[derive(Deserialize)]
struct SubmitResponse {
    tx_id: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    result: serde_json::Value,
}

/// HTTP client for a ledger gateway sidecar, bound to one organization
#[derive(Clone)]
pub struct GatewayLedgerClient {
    client: Client,
    base_url: String,
    channel: String,
    chaincode: String,
    org: String,
}

impl GatewayLedgerClient {
    pub fn new(config: &LedgerConfig, org: &str) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Configuration(format!("ledger client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
            channel: config.channel.clone(),
            chaincode: config.chaincode.clone(),
            org: org.to_string(),
        })
    }

    /// Probe the gateway; used when a role's connection is first established
    pub async fn ping(&self) -> AppResult<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::LedgerUnavailable(format!("gateway unreachable: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::LedgerUnavailable(format!(
                "gateway health check returned {}",
                response.status()
            )))
        }
    }

    fn request_body<'a>(&'a self, op: LedgerOp, args: &'a [String]) -> GatewayRequest<'a> {
        GatewayRequest {
            channel: &self.channel,
            chaincode: &self.chaincode,
            org: &self.org,
            operation: op.as_str(),
            args,
        }
    }
}

#[axum::async_trait]
impl LedgerClient for GatewayLedgerClient {
    async fn submit(&self, op: LedgerOp, args: &[String]) -> AppResult<String> {
        let url = format!("{}/submit", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&self.request_body(op, args))
            .send()
            .await
            .map_err(|e| AppError::LedgerUnavailable(format!("{}: {}", op.as_str(), e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LedgerUnavailable(format!(
                "{} rejected: {} - {}",
                op.as_str(),
                status,
                body
            )));
        }

        let data: SubmitResponse = response.json().await.map_err(|e| {
            AppError::LedgerUnavailable(format!("{}: invalid gateway response: {}", op.as_str(), e))
        })?;

        Ok(data.tx_id)
    }

    async fn query(&self, op: LedgerOp, args: &[String]) -> AppResult<Vec<u8>> {
        let url = format!("{}/query", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&self.request_body(op, args))
            .send()
            .await
            .map_err(|e| AppError::LedgerUnavailable(format!("{}: {}", op.as_str(), e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LedgerUnavailable(format!(
                "{} failed: {} - {}",
                op.as_str(),
                status,
                body
            )));
        }

        let data: QueryResponse = response.json().await.map_err(|e| {
            AppError::LedgerUnavailable(format!("{}: invalid gateway response: {}", op.as_str(), e))
        })?;

        serde_json::to_vec(&data.result)
            .map_err(|e| AppError::Internal(format!("ledger record serialization: {}", e)))
    }
}
