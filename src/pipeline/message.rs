//! Worker message envelope.
//!
//! Requests go out on a per-worker channel, responses come back on one shared
//! channel and are matched to callers by task id.

use serde::{Deserialize, Serialize};

use crate::pipeline::GenerationTask;

/// Message sent to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    Generate { id: String, data: GenerationTask },
    Shutdown,
}

/// Message sent back by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerResponse {
    Success { id: String, data: String },
    Error { id: String, error: String },
    /// Percentage of the task completed, 0 to 100
    Progress { id: String, progress: u8 },
}

impl WorkerResponse {
    pub fn id(&self) -> &str {
        match self {
            WorkerResponse::Success { id, .. }
            | WorkerResponse::Error { id, .. }
            | WorkerResponse::Progress { id, .. } => id,
        }
    }
}
