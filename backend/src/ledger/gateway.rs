//! Per-role ledger connection management
//!
//! One `LedgerGateway` is constructed at startup and shared through
//! `AppState`. Connections are established lazily, once per role, and the
//! outcome is cached for the process lifetime: a role that failed to
//! connect stays failed until `reset` is called explicitly.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::LedgerConfig;
use crate::ledger::client::{GatewayLedgerClient, LedgerClient};
use crate::models::ActorRole;

enum ConnState {
    Ready(Arc<dyn LedgerClient>),
    Failed,
}

/// Explicit per-role connection service for the ledger network
pub struct LedgerGateway {
    config: LedgerConfig,
    connections: Mutex<HashMap<&'static str, ConnState>>,
}

impl LedgerGateway {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Build a gateway pre-seeded with clients, bypassing connection
    /// establishment. Used to inject fakes in tests.
    pub fn with_clients(clients: Vec<(ActorRole, Arc<dyn LedgerClient>)>) -> Self {
        let mut map = HashMap::new();
        for (role, client) in clients {
            map.insert(role.ledger_org(), ConnState::Ready(client));
        }
        Self {
            config: LedgerConfig {
                enabled: true,
                gateway_url: String::new(),
                channel: String::new(),
                chaincode: String::new(),
                timeout_seconds: 1,
            },
            connections: Mutex::new(map),
        }
    }

    /// Get the cached connection for a role, establishing it on first use.
    /// Returns `None` when mirroring is disabled or the connection failed.
    pub async fn client_for(&self, role: ActorRole) -> Option<Arc<dyn LedgerClient>> {
        if !self.config.enabled {
            return None;
        }

        let org = role.ledger_org();
        let mut connections = self.connections.lock().await;

        if let Some(state) = connections.get(org) {
            return match state {
                ConnState::Ready(client) => Some(client.clone()),
                ConnState::Failed => None,
            };
        }

        let state = match self.establish(org).await {
            Ok(client) => {
                tracing::info!("Connected to ledger network as {}", org);
                ConnState::Ready(client)
            }
            Err(e) => {
                tracing::warn!("Ledger network not available for {}: {}", org, e);
                ConnState::Failed
            }
        };

        let result = match &state {
            ConnState::Ready(client) => Some(client.clone()),
            ConnState::Failed => None,
        };
        connections.insert(org, state);
        result
    }

    /// Drop the cached outcome for a role so the next call re-dials.
    /// This is the only path that retries a failed connection.
    pub async fn reset(&self, role: ActorRole) {
        self.connections.lock().await.remove(role.ledger_org());
    }

    async fn establish(&self, org: &str) -> crate::error::AppResult<Arc<dyn LedgerClient>> {
        let client = GatewayLedgerClient::new(&self.config, org)?;
        client.ping().await?;
        Ok(Arc::new(client))
    }
}
