//! Pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::cache::CacheStats;
use crate::error::GenerationError;

/// Lock-free counters updated on every generation call.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    /// Requests served by waiting on an identical in-flight generation
    deduplicated: AtomicU64,
    worker_generations: AtomicU64,
    fallback_generations: AtomicU64,
    worker_timeouts: AtomicU64,
    worker_errors: AtomicU64,
    /// Fallback renders that ran because the worker path failed
    degraded_fallbacks: AtomicU64,
    failures: AtomicU64,
    store_rejections: AtomicU64,
    generation_ms_total: AtomicU64,
}

impl PipelineMetrics {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deduplicated(&self) {
        self.deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_worker_generation(&self, elapsed_ms: u64) {
        self.worker_generations.fetch_add(1, Ordering::Relaxed);
        self.generation_ms_total
            .fetch_add(elapsed_ms, Ordering::Relaxed);
    }

    pub fn record_fallback_generation(&self, elapsed_ms: u64, degraded: bool) {
        self.fallback_generations.fetch_add(1, Ordering::Relaxed);
        if degraded {
            self.degraded_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
        self.generation_ms_total
            .fetch_add(elapsed_ms, Ordering::Relaxed);
    }

    pub fn record_worker_failure(&self, error: &GenerationError) {
        match error {
            GenerationError::WorkerTimeout { .. } => &self.worker_timeouts,
            _ => &self.worker_errors,
        }
        .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_rejection(&self) {
        self.store_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy. Pool and pending figures are filled by the caller.
    pub fn snapshot(&self) -> PipelineStats {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let worker = self.worker_generations.load(Ordering::Relaxed);
        let fallback = self.fallback_generations.load(Ordering::Relaxed);
        let total_ms = self.generation_ms_total.load(Ordering::Relaxed);
        let generations = worker + fallback;

        PipelineStats {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: hits,
            cache_misses: misses,
            hit_rate: CacheStats::hit_rate_of(hits, misses),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            worker_generations: worker,
            fallback_generations: fallback,
            worker_timeouts: self.worker_timeouts.load(Ordering::Relaxed),
            worker_errors: self.worker_errors.load(Ordering::Relaxed),
            degraded_fallbacks: self.degraded_fallbacks.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            store_rejections: self.store_rejections.load(Ordering::Relaxed),
            avg_generation_ms: if generations == 0 {
                0.0
            } else {
                total_ms as f64 / generations as f64
            },
            pending_operations: 0,
            workers: 0,
            healthy_workers: 0,
        }
    }
}

/// Serializable pipeline report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStats {
    pub requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub hit_rate: f64,
    pub deduplicated: u64,
    pub worker_generations: u64,
    pub fallback_generations: u64,
    pub worker_timeouts: u64,
    pub worker_errors: u64,
    pub degraded_fallbacks: u64,
    pub failures: u64,
    pub store_rejections: u64,
    pub avg_generation_ms: f64,
    pub pending_operations: usize,
    pub workers: usize,
    pub healthy_workers: usize,
}
