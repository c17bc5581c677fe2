//! Route definitions for the TraceSafe backend

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Public traceability routes (unauthenticated - for QR code scanning)
        .route("/trace/:batch_id", get(handlers::get_journey))
        .route("/verify/:batch_id", get(handlers::verify_batch))
        .route("/farmers/:farmer_id/public", get(handlers::get_farmer))
        // Device ingestion (authenticated at the network layer, not per-user)
        .route("/iot/readings", post(handlers::ingest_reading))
        // Protected routes - batch lifecycle
        .nest("/batches", batch_routes())
        // Protected routes - farmer profiles and scores
        .nest("/farmers", farmer_routes())
        // Protected routes - telemetry dashboards
        .nest("/iot", telemetry_routes())
        // Protected routes - ledger administration
        .nest("/ledger", ledger_routes())
}

/// Batch lifecycle routes (protected)
fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_batches).post(handlers::create_batch))
        .route("/:batch_id", get(handlers::get_batch))
        .route("/:batch_id/journey", get(handlers::get_journey))
        .route("/:batch_id/pickup", post(handlers::pickup_batch))
        .route("/:batch_id/transit", post(handlers::transit_update))
        .route("/:batch_id/deliver", post(handlers::deliver_batch))
        .route("/:batch_id/receive", post(handlers::receive_batch))
        .route("/:batch_id/sell", post(handlers::sell_batch))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Farmer profile routes (protected)
fn farmer_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(handlers::get_my_profile).put(handlers::upsert_my_profile))
        .route("/:farmer_id/score", put(handlers::recompute_score))
        .route("/scores/recompute", post(handlers::recompute_all_scores))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Telemetry dashboard routes (protected)
fn telemetry_routes() -> Router<AppState> {
    Router::new()
        .route("/batches/:batch_id/readings", get(handlers::get_readings))
        .route("/batches/:batch_id/latest", get(handlers::get_latest_readings))
        .route("/batches/:batch_id/location", get(handlers::get_latest_location))
        .route("/batches/:batch_id/averages", get(handlers::get_averages))
        .route("/batches/:batch_id/averages/:metric", get(handlers::get_metric_average))
        .route("/averages", get(handlers::get_fleet_averages))
        .route("/averages/:metric", get(handlers::get_fleet_metric_average))
        .route("/roles/:role/latest", get(handlers::get_latest_for_role))
        .route("/devices", get(handlers::list_devices))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Ledger administration routes (protected)
fn ledger_routes() -> Router<AppState> {
    Router::new()
        .route("/connections/:role/reset", post(handlers::reset_ledger_connection))
        .route_layer(middleware::from_fn(auth_middleware))
}
