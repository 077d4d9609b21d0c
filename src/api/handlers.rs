//! API Handlers
//!
//! HTTP request handlers for each diagnostics endpoint.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::error::ApiError;
use crate::models::{
    GenerateResponse, HealthResponse, InvalidateRequest, InvalidateResponse,
    MemoryPressureRequest, MemoryPressureResponse, StatsResponse, WarmRequest,
};
use crate::orchestrator::{CacheOrchestrator, WarmReport};
use crate::pipeline::{GenerationPipeline, GenerationRequest};

/// Longest template id accepted over HTTP.
const MAX_TEMPLATE_ID_LEN: usize = 256;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<GenerationPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<GenerationPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn orchestrator(&self) -> &Arc<CacheOrchestrator> {
        self.pipeline.orchestrator()
    }
}

fn validate(req: &GenerationRequest) -> Result<(), ApiError> {
    let id = &req.template.id;
    if id.is_empty() {
        return Err(ApiError::InvalidRequest("Template id cannot be empty".into()));
    }
    if id.len() > MAX_TEMPLATE_ID_LEN {
        return Err(ApiError::InvalidRequest(format!(
            "Template id exceeds maximum length of {MAX_TEMPLATE_ID_LEN} characters"
        )));
    }
    Ok(())
}

/// Handler for POST /generate
pub async fn generate_handler(
    State(state): State<AppState>,
    Json(req): Json<GenerationRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    validate(&req)?;

    let output = state
        .pipeline
        .generate(&req.template, &req.data, &req.options)
        .await?;

    Ok(Json(GenerateResponse::new(output)))
}

/// Handler for POST /warm
pub async fn warm_handler(
    State(state): State<AppState>,
    Json(req): Json<WarmRequest>,
) -> Result<Json<WarmReport>, ApiError> {
    req.requests.iter().try_for_each(validate)?;

    Ok(Json(state.pipeline.warm(req.requests).await))
}

/// Handler for POST /invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let pattern = req.to_pattern().map_err(ApiError::InvalidRequest)?;
    let removed = state.orchestrator().invalidate(&pattern).await;

    Ok(Json(InvalidateResponse { removed }))
}

/// Handler for POST /memory-pressure
///
/// Feeds a pressure event to the orchestrator as a memory monitor would.
pub async fn memory_pressure_handler(
    State(state): State<AppState>,
    Json(event): Json<MemoryPressureRequest>,
) -> Json<MemoryPressureResponse> {
    let released = state.orchestrator().handle_pressure_event(event).await;
    Json(MemoryPressureResponse { released })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        caches: state.orchestrator().stats().await,
        pipeline: state.pipeline.stats().await,
    })
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.pipeline.stats().await;
    Json(HealthResponse::from_workers(stats.workers, stats.healthy_workers))
}
