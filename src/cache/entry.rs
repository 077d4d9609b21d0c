//! Cache Entry Module
//!
//! Defines a single bounded-cache entry with size and access tracking.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// A stored value plus the bookkeeping the cache needs for eviction and TTL.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Size in bytes as counted against the memory budget
    pub size: usize,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Last read or write (Unix milliseconds)
    pub last_access: u64,
    /// Number of reads served from this entry
    pub access_count: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a fresh entry stamped with the current time.
    pub fn new(value: V, size: usize) -> Self {
        let now = current_timestamp_ms();
        Self {
            value,
            size,
            created_at: now,
            last_access: now,
            access_count: 0,
        }
    }

    // == Touch ==
    /// Records a read at `now`.
    pub fn touch(&mut self, now: u64) {
        self.last_access = now;
        self.access_count += 1;
    }

    // == Is Expired ==
    /// Checks whether the entry has been idle for longer than `ttl`.
    ///
    /// Expiry is sliding: every read pushes it back. An entry idle for exactly
    /// `ttl` is still live; it expires once idle time strictly exceeds it.
    /// `None` means the entry never expires.
    pub fn is_expired(&self, now: u64, ttl: Option<Duration>) -> bool {
        match ttl {
            Some(ttl) => now.saturating_sub(self.last_access) > ttl.as_millis() as u64,
            None => false,
        }
    }

    /// Milliseconds since the last access.
    pub fn idle_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_access)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
