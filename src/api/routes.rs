//! API Routes
//!
//! Configures the Axum router: control endpoints under `/__sw` and the
//! proxy fallback for everything else.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_handler, proxy_handler, register_handler, stats_handler, status_handler,
    sync_handler, unregister_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /__sw/register` - Install and activate the worker
/// - `POST /__sw/unregister` - Stop intercepting
/// - `POST /__sw/sync/:tag` - Deliver a background sync trigger
/// - `GET /__sw/status` - Worker phase and cache generations
/// - `GET /__sw/stats` - Interception counters
/// - `GET /__sw/health` - Health check endpoint
/// - anything else - proxied through the worker
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/__sw/register", post(register_handler))
        .route("/__sw/unregister", post(unregister_handler))
        .route("/__sw/sync/:tag", post(sync_handler))
        .route("/__sw/status", get(status_handler))
        .route("/__sw/stats", get(stats_handler))
        .route("/__sw/health", get(health_handler))
        .fallback(proxy_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
