//! Request DTOs for the diagnostics API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::orchestrator::{KeyPattern, MemoryPressureEvent};
use crate::pipeline::GenerationRequest;

/// Longest pattern accepted by POST /invalidate.
const MAX_PATTERN_LEN: usize = 512;

/// Request body for POST /warm
#[derive(Debug, Clone, Deserialize)]
pub struct WarmRequest {
    pub requests: Vec<GenerationRequest>,
}

/// How an invalidation pattern is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternMode {
    Exact,
    #[default]
    Prefix,
    Regex,
}

/// Request body for POST /invalidate
///
/// # Fields
/// - `pattern`: key, key prefix or regular expression
/// - `mode`: how to read `pattern` (default: prefix)
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    pub pattern: String,
    #[serde(default)]
    pub mode: PatternMode,
}

impl InvalidateRequest {
    /// Validates the request and builds the matcher.
    pub fn to_pattern(&self) -> Result<KeyPattern, String> {
        if self.pattern.is_empty() {
            return Err("Pattern cannot be empty".to_string());
        }
        if self.pattern.len() > MAX_PATTERN_LEN {
            return Err(format!(
                "Pattern exceeds maximum length of {MAX_PATTERN_LEN} characters"
            ));
        }
        match self.mode {
            PatternMode::Exact => Ok(KeyPattern::exact(&self.pattern)),
            PatternMode::Prefix => Ok(KeyPattern::prefix(&self.pattern)),
            PatternMode::Regex => {
                KeyPattern::regex(&self.pattern).map_err(|e| format!("Invalid regex: {e}"))
            }
        }
    }
}

/// Request body for POST /memory-pressure, e.g. `{"type": "critical"}`
pub type MemoryPressureRequest = MemoryPressureEvent;
