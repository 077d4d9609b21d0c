//! Cache Orchestrator
//!
//! One surface over the content, artifact and metadata caches. Runs periodic
//! maintenance and reacts to memory pressure signals.

mod pattern;
mod pressure;

pub use pattern::KeyPattern;
pub use pressure::{MemoryPressureEvent, MemoryPressureLevel};

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::cache::{
    Artifact, ArtifactCache, ArtifactMetadata, BoundedCache, CacheStats, ContentCache,
    ContentCacheStats, SharedCache,
};
use crate::config::OrchestratorConfig;
use crate::error::{CacheResult, Result};
use crate::tasks::{spawn_maintenance_task, spawn_pressure_listener};

// == Reports ==
/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MaintenanceReport {
    /// Entries removed because their TTL elapsed
    pub expired: usize,
    /// Aggregate usage after expiry, before any release
    pub memory_bytes: usize,
    pub pressure: MemoryPressureLevel,
    /// Entries evicted because usage crossed the high-water mark
    pub released: usize,
}

/// Outcome of a warm-up batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarmReport {
    /// Ids submitted, repeats included
    pub requested: usize,
    /// Repeats of an id earlier in the same batch
    pub duplicates: usize,
    pub already_cached: usize,
    pub warmed: usize,
    pub failed: usize,
}

/// Totals across all three caches.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TotalStats {
    pub entries: usize,
    pub memory_bytes: usize,
    pub memory_budget: usize,
    pub utilization: f64,
    pub pressure: MemoryPressureLevel,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    /// Times a pressure release was triggered
    pub pressure_releases: u64,
}

/// Aggregated orchestrator report.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrchestratorStats {
    pub content: ContentCacheStats,
    pub artifacts: CacheStats,
    pub metadata: CacheStats,
    pub totals: TotalStats,
}

// == Cache Orchestrator ==
/// Owner of the process-wide caches.
///
/// Construct once, share through `Arc`, and call [`destroy`](Self::destroy)
/// on shutdown.
#[derive(Debug)]
pub struct CacheOrchestrator {
    config: OrchestratorConfig,
    content: ContentCache,
    artifacts: ArtifactCache,
    metadata: SharedCache<String, serde_json::Value>,
    /// Background maintenance and pressure-listener tasks
    tasks: Mutex<Vec<JoinHandle<()>>>,
    destroyed: AtomicBool,
    pressure_releases: AtomicU64,
}

impl CacheOrchestrator {
    // == Constructor ==
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            content: ContentCache::new(config.content.clone(), config.content_compression),
            artifacts: ArtifactCache::new(config.artifacts.clone()),
            metadata: SharedCache::new("metadata", BoundedCache::new(config.metadata.clone())),
            config,
            tasks: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
            pressure_releases: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // == Background Tasks ==
    /// Starts the periodic maintenance task.
    pub fn start(self: &Arc<Self>) {
        let handle = spawn_maintenance_task(Arc::downgrade(self), self.config.cleanup_interval);
        self.lock_tasks().push(handle);
    }

    /// Listens for memory pressure signals from an external monitor.
    pub fn subscribe_memory_pressure(
        self: &Arc<Self>,
        events: broadcast::Receiver<MemoryPressureEvent>,
    ) {
        let handle = spawn_pressure_listener(Arc::downgrade(self), events);
        self.lock_tasks().push(handle);
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Content ==
    pub async fn get_content(&self, key: &str) -> Option<String> {
        self.content.get(key).await
    }

    pub async fn set_content(&self, key: impl Into<String>, content: &str) -> CacheResult<()> {
        self.content.set(key, content).await
    }

    // == Artifacts ==
    pub async fn get_artifact(&self, key: &str) -> Option<String> {
        self.artifacts.get_artifact_data(key).await
    }

    pub async fn get_artifact_with_metadata(&self, key: &str) -> Option<Arc<Artifact>> {
        self.artifacts.get_artifact_with_metadata(key).await
    }

    pub async fn set_artifact(
        &self,
        key: impl Into<String>,
        data: String,
        metadata: ArtifactMetadata,
    ) -> CacheResult<()> {
        self.artifacts.set_artifact(key, data, metadata).await
    }

    pub async fn has_artifact(&self, key: &str) -> bool {
        self.artifacts.has(key).await
    }

    // == Metadata ==
    pub async fn get_metadata(&self, key: &str) -> Option<serde_json::Value> {
        self.metadata.get(key).await
    }

    pub async fn set_metadata(
        &self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> CacheResult<()> {
        self.metadata.set(key.into(), value, None).await
    }

    // == Invalidate ==
    /// Deletes every matching key from every cache. Returns the total removed.
    pub async fn invalidate(&self, pattern: &KeyPattern) -> usize {
        let matches = |key: &String| pattern.matches(key);
        let removed = self.content.store().delete_matching(matches).await
            + self.artifacts.store().delete_matching(matches).await
            + self.metadata.delete_matching(matches).await;

        info!("Invalidated {} entries matching {:?}", removed, pattern);
        removed
    }

    // == Warm Cache ==
    /// Produces and stores artifacts for ids that are not cached yet.
    ///
    /// Each id is produced on its own task. Failures are logged and counted;
    /// they never stop the rest of the batch.
    pub async fn warm_cache<F, Fut>(&self, ids: Vec<String>, producer: F) -> WarmReport
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<(String, ArtifactMetadata)>> + Send + 'static,
    {
        let mut report = WarmReport {
            requested: ids.len(),
            ..Default::default()
        };
        let mut seen = HashSet::new();
        let mut jobs = JoinSet::new();

        for id in ids {
            if !seen.insert(id.clone()) {
                report.duplicates += 1;
                continue;
            }
            if self.artifacts.has(&id).await {
                report.already_cached += 1;
                continue;
            }
            let produce = producer(id.clone());
            jobs.spawn(async move { (id, produce.await) });
        }

        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok((id, Ok((data, metadata)))) => {
                    match self.artifacts.set_artifact(id.clone(), data, metadata).await {
                        Ok(()) => report.warmed += 1,
                        Err(e) => {
                            warn!("Warm-up for {} not cached: {}", id, e);
                            report.failed += 1;
                        }
                    }
                }
                Ok((id, Err(e))) => {
                    warn!("Warm-up for {} failed: {}", id, e);
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("Warm-up task aborted: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Cache warm-up: {} warmed, {} already cached, {} failed, {} duplicates",
            report.warmed, report.already_cached, report.failed, report.duplicates
        );
        report
    }

    // == Maintenance ==
    /// Expires stale entries, then releases memory if usage is above the
    /// high-water mark.
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        let expired = self.content.store().cleanup().await
            + self.artifacts.store().cleanup().await
            + self.metadata.cleanup().await;

        let memory_bytes = self.total_memory_usage().await;
        let pressure = MemoryPressureLevel::from_utilization(self.utilization_of(memory_bytes));

        let released = if memory_bytes > self.config.high_water_bytes() {
            warn!(
                "Cache usage {} bytes above high-water mark {} bytes, releasing",
                memory_bytes,
                self.config.high_water_bytes()
            );
            self.release_memory_pressure().await
        } else {
            0
        };

        if expired > 0 || released > 0 {
            info!(
                "Cache maintenance: expired {}, released {}, usage {} bytes",
                expired, released, memory_bytes
            );
        } else {
            debug!("Cache maintenance: nothing to remove, usage {} bytes", memory_bytes);
        }

        MaintenanceReport {
            expired,
            memory_bytes,
            pressure,
            released,
        }
    }

    /// Evicts every cache down to its default release target.
    pub async fn release_memory_pressure(&self) -> usize {
        self.pressure_releases.fetch_add(1, Ordering::Relaxed);
        self.content.store().release_memory_pressure(None).await
            + self.artifacts.store().release_memory_pressure(None).await
            + self.metadata.release_memory_pressure(None).await
    }

    /// Reacts to a signal from the memory monitor. Returns entries evicted.
    pub async fn handle_pressure_event(&self, event: MemoryPressureEvent) -> usize {
        if event.requires_release() {
            let released = self.release_memory_pressure().await;
            warn!("Memory pressure {:?}: released {} entries", event, released);
            return released;
        }

        if event == MemoryPressureEvent::Warning {
            warn!(
                "Memory pressure warning, cache usage {} bytes",
                self.total_memory_usage().await
            );
        } else {
            debug!("Memory pressure back to normal");
        }
        0
    }

    // == Stats ==
    pub async fn total_memory_usage(&self) -> usize {
        self.content.store().memory_usage().await
            + self.artifacts.store().memory_usage().await
            + self.metadata.memory_usage().await
    }

    fn utilization_of(&self, bytes: usize) -> f64 {
        if self.config.total_memory_budget == 0 {
            0.0
        } else {
            bytes as f64 / self.config.total_memory_budget as f64
        }
    }

    pub async fn stats(&self) -> OrchestratorStats {
        let content = self.content.stats().await;
        let artifacts = self.artifacts.stats().await;
        let metadata = self.metadata.stats().await;

        let all = [&content.cache, &artifacts, &metadata];
        let memory_bytes = all.iter().map(|s| s.memory_bytes).sum();
        let hits = all.iter().map(|s| s.hits).sum();
        let misses = all.iter().map(|s| s.misses).sum();
        let utilization = self.utilization_of(memory_bytes);

        let totals = TotalStats {
            entries: all.iter().map(|s| s.entries).sum(),
            memory_bytes,
            memory_budget: self.config.total_memory_budget,
            utilization,
            pressure: MemoryPressureLevel::from_utilization(utilization),
            hits,
            misses,
            hit_rate: CacheStats::hit_rate_of(hits, misses),
            evictions: all.iter().map(|s| s.evictions).sum(),
            pressure_releases: self.pressure_releases.load(Ordering::Relaxed),
        };

        OrchestratorStats {
            content,
            artifacts,
            metadata,
            totals,
        }
    }

    // == Destroy ==
    /// Stops background tasks and empties every cache. Safe to call twice.
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        let handles = std::mem::take(&mut *self.lock_tasks());
        for handle in handles {
            handle.abort();
        }

        self.content.store().clear().await;
        self.artifacts.store().clear().await;
        self.metadata.clear().await;
        info!("Cache orchestrator destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}
