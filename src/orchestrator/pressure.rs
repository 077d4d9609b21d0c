//! Memory pressure signals and levels.

use serde::{Deserialize, Serialize};

// == Memory Pressure Event ==
/// Signal emitted by an external process-memory monitor.
///
/// Serialized as `{"type": "critical"}` and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryPressureEvent {
    Normal,
    Warning,
    Critical,
    LeakSuspected,
}

impl MemoryPressureEvent {
    /// Critical and leak-suspected signals demand immediate eviction.
    pub fn requires_release(&self) -> bool {
        matches!(
            self,
            MemoryPressureEvent::Critical | MemoryPressureEvent::LeakSuspected
        )
    }
}

// == Memory Pressure Level ==
/// Cache-side classification of aggregate memory usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPressureLevel {
    /// Below 50% of the budget
    Low,
    /// 50% to 75%
    Moderate,
    /// 75% to 90%
    High,
    /// 90% and above
    Critical,
}

impl MemoryPressureLevel {
    /// Level for a utilization ratio (0.0 to 1.0).
    pub fn from_utilization(utilization: f64) -> Self {
        if utilization < 0.5 {
            MemoryPressureLevel::Low
        } else if utilization < 0.75 {
            MemoryPressureLevel::Moderate
        } else if utilization < 0.90 {
            MemoryPressureLevel::High
        } else {
            MemoryPressureLevel::Critical
        }
    }
}
