//! Process surface for the automation core.
//!
//! The full HTTP API lives in the platform's API service; the core
//! itself exposes exactly one probe: `GET /health` answers `ok` iff the
//! backing store responds to a ping. Liveness checks and rollout gates
//! point here.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;

/// Anything that can answer "is the database reachable".
#[async_trait]
pub trait StorePing: Send + Sync {
    /// Ping the backing store.
    async fn ping(&self) -> bool;
}

/// Install the default tracing subscriber, honoring `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// Build the probe router.
pub fn health_router(ping: Arc<dyn StorePing>) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(ping)
}

async fn health(State(ping): State<Arc<dyn StorePing>>) -> (StatusCode, &'static str) {
    if ping.ping().await {
        (StatusCode::OK, "ok")
    } else {
        tracing::error!("health probe failed: store ping returned false");
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    }
}
