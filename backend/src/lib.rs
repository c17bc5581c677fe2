//! TraceSafe backend library
//!
//! Custody tracking for produce batches from farm to point of sale, with a
//! relational system of record and best-effort mirroring onto a
//! permissioned ledger network.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

pub use config::Config;

use external::WeatherClient;
use ledger::LedgerGateway;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub ledger: Arc<LedgerGateway>,
    pub weather: WeatherClient,
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "TraceSafe API v1.0"
}
