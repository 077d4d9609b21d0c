//! LRU Order Module
//!
//! Tracks recency of keys for least-recently-used eviction.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

// == LRU Order ==
/// Total recency order over live keys.
///
/// Every access stamps a key with the next value of a monotonic counter, so
/// the smallest stamp is always the single least recently used key:
/// - `by_stamp` first entry = least recently used
/// - `by_stamp` last entry = most recently used
#[derive(Debug)]
pub struct LruOrder<K> {
    /// Next access stamp
    clock: u64,
    /// Current stamp per key
    stamps: HashMap<K, u64>,
    /// Keys ordered by stamp, oldest first
    by_stamp: BTreeMap<u64, K>,
}

impl<K> Default for LruOrder<K> {
    fn default() -> Self {
        Self {
            clock: 0,
            stamps: HashMap::new(),
            by_stamp: BTreeMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> LruOrder<K> {
    // == Constructor ==
    /// Creates an empty order.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_stamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    // == Insert ==
    /// Places `key` at the most recently used end, moving it if already tracked.
    pub fn insert(&mut self, key: K) {
        let stamp = self.next_stamp();
        if let Some(old) = self.stamps.insert(key.clone(), stamp) {
            self.by_stamp.remove(&old);
        }
        self.by_stamp.insert(stamp, key);
    }

    // == Touch ==
    /// Moves an already tracked key to the most recently used end.
    ///
    /// Returns false if the key is not tracked.
    pub fn touch<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let stamp = self.next_stamp();
        let Some(slot) = self.stamps.get_mut(key) else {
            return false;
        };
        let old = std::mem::replace(slot, stamp);
        if let Some(owned) = self.by_stamp.remove(&old) {
            self.by_stamp.insert(stamp, owned);
        }
        true
    }

    // == Remove ==
    /// Stops tracking a key. Returns true if it was tracked.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.stamps.remove(key) {
            Some(stamp) => {
                self.by_stamp.remove(&stamp);
                true
            }
            None => false,
        }
    }

    // == Pop Oldest ==
    /// Removes and returns the least recently used key.
    pub fn pop_oldest(&mut self) -> Option<K> {
        let (_, key) = self.by_stamp.pop_first()?;
        self.stamps.remove(&key);
        Some(key)
    }

    // == Peek ==
    /// Least recently used key, if any.
    pub fn peek_oldest(&self) -> Option<&K> {
        self.by_stamp.first_key_value().map(|(_, k)| k)
    }

    /// Most recently used key, if any.
    pub fn peek_newest(&self) -> Option<&K> {
        self.by_stamp.last_key_value().map(|(_, k)| k)
    }

    /// Iterates keys from least to most recently used.
    pub fn iter_oldest_first(&self) -> impl Iterator<Item = &K> {
        self.by_stamp.values()
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.stamps.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
        self.by_stamp.clear();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn order_of(lru: &LruOrder<String>) -> Vec<&str> {
        lru.iter_oldest_first().map(String::as_str).collect()
    }

    #[test]
    fn test_lru_new() {
        let lru: LruOrder<String> = LruOrder::new();
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.peek_oldest(), None);
    }

    #[test]
    fn test_insert_order() {
        let mut lru = LruOrder::new();
        lru.insert("a".to_string());
        lru.insert("b".to_string());
        lru.insert("c".to_string());

        assert_eq!(order_of(&lru), vec!["a", "b", "c"]);
        assert_eq!(lru.peek_oldest().map(String::as_str), Some("a"));
        assert_eq!(lru.peek_newest().map(String::as_str), Some("c"));
    }

    #[test]
    fn test_touch_moves_to_newest() {
        let mut lru = LruOrder::new();
        lru.insert("a".to_string());
        lru.insert("b".to_string());
        lru.insert("c".to_string());

        assert!(lru.touch("a"));

        assert_eq!(order_of(&lru), vec!["b", "c", "a"]);
        assert_eq!(lru.len(), 3);
    }

    #[test]
    fn test_touch_untracked_key() {
        let mut lru = LruOrder::new();
        lru.insert("a".to_string());

        assert!(!lru.touch("missing"));
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn test_reinsert_does_not_duplicate() {
        let mut lru = LruOrder::new();
        lru.insert("a".to_string());
        lru.insert("b".to_string());
        lru.insert("a".to_string());

        assert_eq!(lru.len(), 2);
        assert_eq!(order_of(&lru), vec!["b", "a"]);
    }

    #[test]
    fn test_pop_oldest() {
        let mut lru = LruOrder::new();
        lru.insert("a".to_string());
        lru.insert("b".to_string());
        lru.touch("a");

        assert_eq!(lru.pop_oldest(), Some("b".to_string()));
        assert_eq!(lru.pop_oldest(), Some("a".to_string()));
        assert_eq!(lru.pop_oldest(), None);
        assert!(lru.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut lru = LruOrder::new();
        lru.insert("a".to_string());
        lru.insert("b".to_string());
        lru.insert("c".to_string());

        assert!(lru.remove("b"));
        assert!(!lru.remove("b"));

        assert!(!lru.contains("b"));
        assert_eq!(order_of(&lru), vec!["a", "c"]);
    }

    #[test]
    fn test_order_after_multiple_touches() {
        let mut lru = LruOrder::new();
        for key in ["a", "b", "c"] {
            lru.insert(key.to_string());
        }
        lru.touch("a");
        lru.touch("c");
        lru.touch("b");

        assert_eq!(lru.pop_oldest().as_deref(), Some("a"));
        assert_eq!(lru.pop_oldest().as_deref(), Some("c"));
        assert_eq!(lru.pop_oldest().as_deref(), Some("b"));
    }

    #[test]
    fn test_clear() {
        let mut lru = LruOrder::new();
        lru.insert(1u32);
        lru.insert(2u32);
        lru.clear();

        assert!(lru.is_empty());
        assert_eq!(lru.pop_oldest(), None);
    }
}
