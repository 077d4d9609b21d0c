//! Error types for the cache and generation pipeline
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Reasons a value could not be stored in a bounded cache.
///
/// Both variants are recoverable: the caller simply proceeds without caching.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The value alone is larger than the cache's memory budget
    #[error("Value of {size} bytes exceeds cache budget of {max} bytes")]
    Rejected { size: usize, max: usize },

    /// Eviction emptied the cache and the value still does not fit
    #[error("Eviction exhausted: cannot make room for {size} bytes")]
    EvictionExhausted { size: usize },
}

// == Render Error ==
/// Failure reported by a document renderer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Render failed: {0}")]
pub struct RenderError(pub String);

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

// == Generation Error Enum ==
/// Errors raised while producing a document.
///
/// Worker-side variants are normally absorbed by the fallback path and only
/// surface in logs and metrics. Callers see `Render` when only the in-process
/// renderer ran and failed, and `Failed` when the worker and the fallback
/// both failed.
#[derive(Error, Debug, Clone)]
pub enum GenerationError {
    /// No response from a worker within the timeout window
    #[error("Worker timed out after {timeout_ms}ms for task {task_id}")]
    WorkerTimeout { task_id: String, timeout_ms: u64 },

    /// The worker answered with an explicit error
    #[error("Worker error for task {task_id}: {message}")]
    Worker { task_id: String, message: String },

    /// No healthy worker could accept the task
    #[error("Worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// The renderer failed in-process
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Every generation path failed
    #[error("Generation failed: {0}")]
    Failed(String),
}

// == API Error Enum ==
/// Errors returned by the HTTP diagnostics surface.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Document generation failed
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Generation(GenerationError::Render(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Aliases ==
/// Result of a cache insertion.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Result of a generation call.
pub type Result<T> = std::result::Result<T, GenerationError>;
