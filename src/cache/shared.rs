//! Shared Cache Module
//!
//! Wraps a [`BoundedCache`] in an async lock so foreground requests, the
//! maintenance task, and the pressure listener can all touch it.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;

use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{BoundedCache, CacheStats};
use crate::error::CacheResult;

// == Shared Cache ==
/// A named, lock-protected bounded cache.
///
/// Every mutating call takes the write lock, so the size and entry-count
/// invariants hold under any interleaving. `get` mutates recency and
/// therefore also needs the write lock; `has`, `keys`, `values` and `stats`
/// only read.
pub struct SharedCache<K, V> {
    name: &'static str,
    inner: RwLock<BoundedCache<K, V>>,
}

impl<K, V> fmt::Debug for SharedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCache")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<K, V> SharedCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub fn new(name: &'static str, cache: BoundedCache<K, V>) -> Self {
        Self {
            name,
            inner: RwLock::new(cache),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.inner.write().await.get(key)
    }

    pub async fn set(&self, key: K, value: V, explicit_size: Option<usize>) -> CacheResult<()> {
        self.inner.write().await.set(key, value, explicit_size)
    }

    pub async fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.write().await.delete(key)
    }

    pub async fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.read().await.has(key)
    }

    pub async fn cleanup(&self) -> usize {
        let removed = self.inner.write().await.cleanup();
        if removed > 0 {
            debug!("{} cache: expired {} entries", self.name, removed);
        }
        removed
    }

    pub async fn release_memory_pressure(&self, target: Option<usize>) -> usize {
        let evicted = self.inner.write().await.release_memory_pressure(target);
        if evicted > 0 {
            debug!("{} cache: released {} entries under pressure", self.name, evicted);
        }
        evicted
    }

    /// Deletes every key matching `predicate`. Returns the number removed.
    ///
    /// The key snapshot and the deletions happen under one write lock.
    pub async fn delete_matching<F>(&self, predicate: F) -> usize
    where
        F: Fn(&K) -> bool,
    {
        let mut cache = self.inner.write().await;
        let doomed: Vec<K> = cache.keys().into_iter().filter(|k| predicate(k)).collect();
        doomed.iter().filter(|key| cache.delete(*key)).count()
    }

    pub async fn keys(&self) -> Vec<K> {
        self.inner.read().await.keys()
    }

    pub async fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.inner.read().await.values()
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.read().await.stats()
    }

    pub async fn memory_usage(&self) -> usize {
        self.inner.read().await.memory_usage()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}
