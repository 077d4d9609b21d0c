//! Configuration Module
//!
//! Handles loading cache, pipeline and server configuration from environment
//! variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

const MB: usize = 1024 * 1024;

/// Upper bound on the default worker count.
pub const MAX_DEFAULT_WORKERS: usize = 4;

// == Bounded Cache Config ==
/// Limits for one bounded cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedCacheConfig {
    /// Maximum number of live entries
    pub max_entries: usize,
    /// Maximum total size of live entries in bytes
    pub max_memory_bytes: usize,
    /// Idle time after which an entry expires; `None` never expires
    pub ttl: Option<Duration>,
}

impl BoundedCacheConfig {
    pub fn new(max_entries: usize, max_memory_bytes: usize, ttl: Duration) -> Self {
        Self {
            max_entries,
            max_memory_bytes,
            ttl: Some(ttl),
        }
    }

    /// Content cache: many small entries, short TTL.
    pub fn content_defaults() -> Self {
        Self::new(500, 50 * MB, Duration::from_secs(30 * 60))
    }

    /// Artifact cache: few large entries, long TTL.
    pub fn artifact_defaults() -> Self {
        Self::new(50, 100 * MB, Duration::from_secs(2 * 60 * 60))
    }

    /// Metadata cache.
    pub fn metadata_defaults() -> Self {
        Self::new(1000, 10 * MB, Duration::from_secs(60 * 60))
    }

    fn from_env(prefix: &str, defaults: Self) -> Self {
        let ttl_default = defaults.ttl.map_or(0, |ttl| ttl.as_secs());
        let ttl_secs: u64 = env_or(&format!("{prefix}_TTL_SECS"), ttl_default);
        Self {
            max_entries: env_or(&format!("{prefix}_MAX_ENTRIES"), defaults.max_entries),
            max_memory_bytes: env_or(&format!("{prefix}_MAX_MB"), defaults.max_memory_bytes / MB)
                * MB,
            ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
        }
    }
}

// == Orchestrator Config ==
/// Settings for the cache orchestrator and its children.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub content: BoundedCacheConfig,
    pub artifacts: BoundedCacheConfig,
    pub metadata: BoundedCacheConfig,
    /// Compact stylesheet text before storing it
    pub content_compression: bool,
    /// Budget the aggregate usage is measured against
    pub total_memory_budget: usize,
    /// Fraction of the budget above which maintenance releases memory
    pub high_water_mark: f64,
    /// Interval of the background maintenance pass
    pub cleanup_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            content: BoundedCacheConfig::content_defaults(),
            artifacts: BoundedCacheConfig::artifact_defaults(),
            metadata: BoundedCacheConfig::metadata_defaults(),
            content_compression: true,
            total_memory_budget: 160 * MB,
            high_water_mark: 0.85,
            cleanup_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl OrchestratorConfig {
    /// Usage in bytes above which maintenance releases memory.
    pub fn high_water_bytes(&self) -> usize {
        (self.total_memory_budget as f64 * self.high_water_mark) as usize
    }
}

// == Pipeline Config ==
/// Settings for the generation pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of worker threads; 0 disables the pool
    pub worker_count: usize,
    /// How long a caller waits for a worker response
    pub task_timeout: Duration,
    /// Template bodies at least this long are treated as heavy
    pub heavy_template_bytes: usize,
    /// Collapse concurrent misses for the same key into one generation
    pub single_flight: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            task_timeout: Duration::from_secs(30),
            heavy_template_bytes: 16 * 1024,
            single_flight: false,
        }
    }
}

/// Available parallelism capped at [`MAX_DEFAULT_WORKERS`].
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_DEFAULT_WORKERS)
}

// == Config ==
/// Top-level configuration for the binary.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    pub orchestrator: OrchestratorConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` (default: 3000)
    /// - `CONTENT_CACHE_MAX_ENTRIES` / `_MAX_MB` / `_TTL_SECS` (500 / 50 / 1800)
    /// - `CONTENT_COMPRESSION` (true)
    /// - `ARTIFACT_CACHE_MAX_ENTRIES` / `_MAX_MB` / `_TTL_SECS` (50 / 100 / 7200)
    /// - `METADATA_CACHE_MAX_ENTRIES` / `_MAX_MB` / `_TTL_SECS` (1000 / 10 / 3600)
    /// - `CACHE_MEMORY_BUDGET_MB` (160)
    /// - `CACHE_HIGH_WATER_PCT` (85)
    /// - `CLEANUP_INTERVAL_SECS` (300)
    /// - `WORKER_COUNT` (available parallelism, at most 4)
    /// - `WORKER_TIMEOUT_MS` (30000)
    /// - `HEAVY_TEMPLATE_BYTES` (16384)
    /// - `SINGLE_FLIGHT` (false)
    ///
    /// A TTL of 0 disables expiry for that cache.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let orch = defaults.orchestrator;
        let pipe = defaults.pipeline;

        let high_water_pct: u64 =
            env_or("CACHE_HIGH_WATER_PCT", (orch.high_water_mark * 100.0) as u64);

        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            orchestrator: OrchestratorConfig {
                content: BoundedCacheConfig::from_env("CONTENT_CACHE", orch.content),
                artifacts: BoundedCacheConfig::from_env("ARTIFACT_CACHE", orch.artifacts),
                metadata: BoundedCacheConfig::from_env("METADATA_CACHE", orch.metadata),
                content_compression: env_or("CONTENT_COMPRESSION", orch.content_compression),
                total_memory_budget: env_or("CACHE_MEMORY_BUDGET_MB", orch.total_memory_budget / MB)
                    * MB,
                high_water_mark: (high_water_pct.min(100) as f64) / 100.0,
                cleanup_interval: Duration::from_secs(env_or(
                    "CLEANUP_INTERVAL_SECS",
                    orch.cleanup_interval.as_secs(),
                )),
            },
            pipeline: PipelineConfig {
                worker_count: env_or("WORKER_COUNT", pipe.worker_count),
                task_timeout: Duration::from_millis(env_or(
                    "WORKER_TIMEOUT_MS",
                    pipe.task_timeout.as_millis() as u64,
                )),
                heavy_template_bytes: env_or("HEAVY_TEMPLATE_BYTES", pipe.heavy_template_bytes),
                single_flight: env_or("SINGLE_FLIGHT", pipe.single_flight),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            orchestrator: OrchestratorConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Parses an environment variable, falling back to `default` when unset or invalid.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
