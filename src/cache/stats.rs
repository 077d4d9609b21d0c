//! Cache Statistics Module
//!
//! Counters and snapshots describing a bounded cache.

use serde::Serialize;

// == Cache Counters ==
/// Running counters owned by a bounded cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    /// Entries removed to make room (count, bytes, or pressure)
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
    /// Insertions refused because the value could not fit
    pub rejections: u64,
}

impl CacheCounters {
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    pub fn record_rejection(&mut self) {
        self.rejections += 1;
    }
}

// == Cache Stats ==
/// Point-in-time report for one cache.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CacheStats {
    /// Entries currently held, including expired ones not yet swept
    pub entries: usize,
    /// Entries past their TTL that the next read or cleanup will drop
    pub stale_entries: usize,
    /// Entry limit
    pub max_entries: usize,
    /// Bytes currently counted against the budget
    pub memory_bytes: usize,
    /// Byte budget
    pub max_memory_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    /// hits / (hits + misses), 0.0 before any read
    pub hit_rate: f64,
    pub evictions: u64,
    pub expirations: u64,
    pub rejections: u64,
    /// Last access of the least recently used entry (Unix ms)
    pub oldest_access_ms: Option<u64>,
    /// Last access of the most recently used entry (Unix ms)
    pub newest_access_ms: Option<u64>,
    /// Creation time of the longest-held entry (Unix ms)
    pub oldest_created_ms: Option<u64>,
    /// Reads served by the entries currently held
    pub entry_reads: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate_of(hits: u64, misses: u64) -> f64 {
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Fraction of the byte budget in use.
    pub fn memory_utilization(&self) -> f64 {
        if self.max_memory_bytes == 0 {
            0.0
        } else {
            self.memory_bytes as f64 / self.max_memory_bytes as f64
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::hit_rate_of(0, 0), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        assert_eq!(CacheStats::hit_rate_of(1, 1), 0.5);
        assert_eq!(CacheStats::hit_rate_of(3, 0), 1.0);
        assert_eq!(CacheStats::hit_rate_of(0, 2), 0.0);
    }

    #[test]
    fn test_counters_record() {
        let mut counters = CacheCounters::default();
        counters.record_hit();
        counters.record_miss();
        counters.record_miss();
        counters.record_eviction();
        counters.record_expiration();
        counters.record_rejection();

        assert_eq!(counters.hits, 1);
        assert_eq!(counters.misses, 2);
        assert_eq!(counters.evictions, 1);
        assert_eq!(counters.expirations, 1);
        assert_eq!(counters.rejections, 1);
    }

    #[test]
    fn test_memory_utilization() {
        let stats = CacheStats {
            memory_bytes: 25,
            max_memory_bytes: 100,
            ..Default::default()
        };
        assert_eq!(stats.memory_utilization(), 0.25);
        assert_eq!(CacheStats::default().memory_utilization(), 0.0);
    }
}
