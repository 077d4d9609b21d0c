//! Bounded Cache Module
//!
//! LRU cache limited by both entry count and total byte size, with sliding TTL.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::stats::CacheCounters;
use crate::cache::{CacheEntry, CacheStats, LruOrder};
use crate::config::BoundedCacheConfig;
use crate::error::{CacheError, CacheResult};

/// Fraction of the byte budget `release_memory_pressure` aims for by default.
pub const DEFAULT_RELEASE_RATIO: f64 = 0.7;

// == Size Estimator ==
/// Computes the number of bytes a value counts against the memory budget.
pub type SizeEstimator<V> = Arc<dyn Fn(&V) -> usize + Send + Sync>;

/// Generic estimator: length of the value's JSON encoding.
///
/// Values that fail to serialize are counted as zero bytes.
pub fn json_size_estimator<V: Serialize + 'static>() -> SizeEstimator<V> {
    Arc::new(|value: &V| serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0))
}

// == Bounded Cache ==
/// LRU cache with entry-count and byte-size limits.
///
/// After every mutating call `len() <= max_entries` and
/// `memory_usage() <= max_memory_bytes`. Not synchronized; see
/// [`SharedCache`](crate::cache::SharedCache) for the locked wrapper.
pub struct BoundedCache<K, V> {
    /// Key-value storage
    entries: HashMap<K, CacheEntry<V>>,
    /// Recency order of live keys
    lru: LruOrder<K>,
    /// Running counters
    counters: CacheCounters,
    /// Bytes currently stored
    current_size: usize,
    config: BoundedCacheConfig,
    size_of: SizeEstimator<V>,
}

impl<K, V> fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("entries", &self.entries.len())
            .field("current_size", &self.current_size)
            .field("config", &self.config)
            .finish()
    }
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Serialize + 'static,
{
    // == Constructor ==
    /// Creates a cache that sizes values by their JSON encoding.
    pub fn new(config: BoundedCacheConfig) -> Self {
        Self::with_estimator(config, json_size_estimator())
    }
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Creates a cache with a caller-supplied size estimator.
    pub fn with_estimator(config: BoundedCacheConfig, size_of: SizeEstimator<V>) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruOrder::new(),
            counters: CacheCounters::default(),
            current_size: 0,
            config,
            size_of,
        }
    }

    pub fn config(&self) -> &BoundedCacheConfig {
        &self.config
    }

    // == Get ==
    /// Returns a clone of the value if present and not expired.
    ///
    /// A hit refreshes recency and the entry's access count. An expired entry
    /// is removed on the spot and counted as a miss.
    pub fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let now = current_timestamp_ms();
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(now, self.config.ttl),
            None => {
                self.counters.record_miss();
                return None;
            }
        };

        if expired {
            self.remove_entry(key);
            self.counters.record_expiration();
            self.counters.record_miss();
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.touch(now);
        let value = entry.value.clone();
        self.lru.touch(key);
        self.counters.record_hit();
        Some(value)
    }

    // == Set ==
    /// Stores a value, evicting least recently used entries as needed.
    ///
    /// `explicit_size` bypasses the size estimator. A value bigger than the
    /// whole byte budget is refused without touching the cache. Replacing an
    /// existing key first drops the old entry and its size.
    pub fn set(&mut self, key: K, value: V, explicit_size: Option<usize>) -> CacheResult<()> {
        let size = explicit_size.unwrap_or_else(|| (self.size_of)(&value));

        if size > self.config.max_memory_bytes {
            self.counters.record_rejection();
            debug!(
                "Rejected {:?}: {} bytes exceeds budget of {} bytes",
                key, size, self.config.max_memory_bytes
            );
            return Err(CacheError::Rejected {
                size,
                max: self.config.max_memory_bytes,
            });
        }

        self.remove_entry(&key);

        while self.entries.len() >= self.config.max_entries
            || self.current_size + size > self.config.max_memory_bytes
        {
            if !self.evict_oldest() {
                self.counters.record_rejection();
                return Err(CacheError::EvictionExhausted { size });
            }
        }

        self.entries.insert(key.clone(), CacheEntry::new(value, size));
        self.lru.insert(key);
        self.current_size += size;
        Ok(())
    }

    // == Delete ==
    /// Removes an entry. Returns true if the key was present.
    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key)
    }

    // == Has ==
    /// Read-only existence check that honors TTL but leaves recency alone.
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = current_timestamp_ms();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now, self.config.ttl))
    }

    // == Cleanup ==
    /// Removes every expired entry. Returns the number removed.
    pub fn cleanup(&mut self) -> usize {
        let now = current_timestamp_ms();
        let ttl = self.config.ttl;
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key);
            self.counters.record_expiration();
        }

        if !expired.is_empty() {
            trace!("Expired {} entries", expired.len());
        }
        expired.len()
    }

    // == Release Memory Pressure ==
    /// Evicts least recently used entries until usage is at or below `target`.
    ///
    /// Defaults to 70% of the byte budget. Returns the number evicted.
    pub fn release_memory_pressure(&mut self, target: Option<usize>) -> usize {
        let target = target.unwrap_or_else(|| self.default_release_target());
        let mut evicted = 0;
        while self.current_size > target && self.evict_oldest() {
            evicted += 1;
        }
        evicted
    }

    /// Byte level `release_memory_pressure` aims for when given no target.
    pub fn default_release_target(&self) -> usize {
        (self.config.max_memory_bytes as f64 * DEFAULT_RELEASE_RATIO) as usize
    }

    // == Snapshots ==
    /// Live keys, least recently used first. Expired entries awaiting a
    /// sweep are skipped.
    pub fn keys(&self) -> Vec<K> {
        let now = current_timestamp_ms();
        self.lru
            .iter_oldest_first()
            .filter(|key| self.is_live(key, now))
            .cloned()
            .collect()
    }

    /// Live values, least recently used first.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        let now = current_timestamp_ms();
        self.lru
            .iter_oldest_first()
            .filter_map(|key| self.entries.get(key))
            .filter(|entry| !entry.is_expired(now, self.config.ttl))
            .map(|entry| entry.value.clone())
            .collect()
    }

    // == Stats ==
    /// Returns a point-in-time report.
    pub fn stats(&self) -> CacheStats {
        let now = current_timestamp_ms();
        let access_of = |key: Option<&K>| {
            key.and_then(|k| self.entries.get(k))
                .map(|entry| entry.last_access)
        };
        let stale_entries = self
            .entries
            .values()
            .filter(|entry| entry.is_expired(now, self.config.ttl))
            .count();

        CacheStats {
            entries: self.entries.len(),
            stale_entries,
            max_entries: self.config.max_entries,
            memory_bytes: self.current_size,
            max_memory_bytes: self.config.max_memory_bytes,
            hits: self.counters.hits,
            misses: self.counters.misses,
            hit_rate: CacheStats::hit_rate_of(self.counters.hits, self.counters.misses),
            evictions: self.counters.evictions,
            expirations: self.counters.expirations,
            rejections: self.counters.rejections,
            oldest_access_ms: access_of(self.lru.peek_oldest()),
            newest_access_ms: access_of(self.lru.peek_newest()),
            oldest_created_ms: self.entries.values().map(|entry| entry.created_at).min(),
            entry_reads: self.entries.values().map(|entry| entry.access_count).sum(),
        }
    }

    /// Drops every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.current_size = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes currently counted against the budget.
    pub fn memory_usage(&self) -> usize {
        self.current_size
    }

    // == Internals ==
    fn remove_entry<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.entries.remove(key) {
            Some(entry) => {
                self.current_size -= entry.size;
                self.lru.remove(key);
                true
            }
            None => false,
        }
    }

    fn evict_oldest(&mut self) -> bool {
        let Some(key) = self.lru.pop_oldest() else {
            return false;
        };
        if let Some(entry) = self.entries.remove(&key) {
            self.current_size -= entry.size;
            trace!(
                "Evicted {:?} after {} reads, idle {}ms",
                key,
                entry.access_count,
                entry.idle_ms(current_timestamp_ms())
            );
        }
        self.counters.record_eviction();
        true
    }

    fn is_live(&self, key: &K, now: u64) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now, self.config.ttl))
    }
}
