//! API Routes
//!
//! Configures the Axum router: the `/_cache` admin endpoints plus a fallback
//! that proxies everything else.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{
    clear_handler, health_handler, invalidate_handler, precache_handler, proxy_handler,
    stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/_cache/health", get(health_handler))
        .route("/_cache/stats", get(stats_handler))
        .route("/_cache/:partition", delete(clear_handler))
        .route("/_cache/:partition/entry", delete(invalidate_handler))
        .route("/_cache/:partition/precache", post(precache_handler))
        .fallback(proxy_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
