//! Response DTOs for the diagnostics API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::orchestrator::OrchestratorStats;
use crate::pipeline::PipelineStats;

/// Response body for POST /generate
#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    /// Generated document
    pub output: String,
    /// Length of `output` in bytes
    pub bytes: usize,
}

impl GenerateResponse {
    pub fn new(output: String) -> Self {
        Self {
            bytes: output.len(),
            output,
        }
    }
}

/// Response body for POST /invalidate
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// Entries removed across all caches
    pub removed: usize,
}

/// Response body for POST /memory-pressure
#[derive(Debug, Clone, Serialize)]
pub struct MemoryPressureResponse {
    /// Entries evicted in reaction to the event
    pub released: usize,
}

/// Response body for GET /stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub caches: OrchestratorStats,
    pub pipeline: PipelineStats,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy", or "degraded" when every worker is down
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    pub workers: usize,
    pub healthy_workers: usize,
}

impl HealthResponse {
    /// Creates a HealthResponse with current timestamp
    pub fn from_workers(workers: usize, healthy_workers: usize) -> Self {
        let status = if workers > 0 && healthy_workers == 0 {
            "degraded"
        } else {
            "healthy"
        };
        Self {
            status: status.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            workers,
            healthy_workers,
        }
    }
}
