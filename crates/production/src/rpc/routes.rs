//! Route configuration for the RPC API.

use super::handlers::*;
use super::state::RpcState;
use axum::{
    routing::{get, post},
    Router,
};
use kvstore_storage::KvStore;

/// Create the full router with all RPC routes.
pub fn create_router<S: KvStore + 'static>(state: RpcState<S>) -> Router {
    Router::new()
        // Health & readiness probes (no prefix)
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler::<S>))
        // Metrics (no prefix, for Prometheus scraping)
        .route("/metrics", get(metrics_handler::<S>))
        // Consensus driver callbacks
        .route("/abci", post(abci_handler::<S>))
        // API v1 routes
        .nest("/api/v1", api_v1_routes::<S>())
        .with_state(state)
}

/// Create the `/api/v1` router.
fn api_v1_routes<S: KvStore + 'static>() -> Router<RpcState<S>> {
    Router::new()
        .route("/status", get(status_handler::<S>))
        .route("/query", get(query_empty_key_handler::<S>))
        .route("/query/{key_hex}", get(query_handler::<S>))
        .route("/check_tx", post(check_tx_handler::<S>))
}
