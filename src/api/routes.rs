//! API Routes
//!
//! Configures the Axum router with all diagnostics endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    generate_handler, health_handler, invalidate_handler, memory_pressure_handler, stats_handler,
    warm_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /generate` - Generate (or fetch the cached) document
/// - `POST /warm` - Pre-generate a batch of documents
/// - `POST /invalidate` - Drop cache entries matching a pattern
/// - `POST /memory-pressure` - Inject a memory pressure event
/// - `GET /stats` - Cache and pipeline statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/generate", post(generate_handler))
        .route("/warm", post(warm_handler))
        .route("/invalidate", post(invalidate_handler))
        .route("/memory-pressure", post(memory_pressure_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
