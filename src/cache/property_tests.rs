//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the bounded cache invariants under arbitrary
//! operation sequences.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use crate::cache::BoundedCache;
use crate::config::BoundedCacheConfig;
use crate::error::CacheError;

// == Test Configuration ==
const TEST_TTL: Duration = Duration::from_secs(300);

fn cache(max_entries: usize, max_memory_bytes: usize) -> BoundedCache<String, String> {
    BoundedCache::with_estimator(
        BoundedCacheConfig {
            max_entries,
            max_memory_bytes,
            ttl: Some(TEST_TTL),
        },
        Arc::new(|v: &String| v.len()),
    )
}

// == Strategies ==
/// Keys from a small alphabet so sequences revisit keys often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-h]{1,2}".prop_map(|s| s)
}

/// Values with widely varying sizes
fn value_strategy() -> impl Strategy<Value = String> {
    (0usize..200).prop_map(|n| "v".repeat(n))
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
    Release { target: usize },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        3 => key_strategy().prop_map(|key| CacheOp::Get { key }),
        1 => key_strategy().prop_map(|key| CacheOp::Delete { key }),
        1 => (0usize..300).prop_map(|target| CacheOp::Release { target }),
    ]
}

fn apply(store: &mut BoundedCache<String, String>, op: CacheOp) {
    match op {
        CacheOp::Set { key, value } => {
            let _ = store.set(key, value, None);
        }
        CacheOp::Get { key } => {
            store.get(&key);
        }
        CacheOp::Delete { key } => {
            store.delete(&key);
        }
        CacheOp::Release { target } => {
            store.release_memory_pressure(Some(target));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Entry count never exceeds the configured limit
    #[test]
    fn prop_entry_limit_holds(
        max_entries in 1usize..10,
        ops in prop::collection::vec(cache_op_strategy(), 1..120)
    ) {
        let mut store = cache(max_entries, 10_000);

        for op in ops {
            apply(&mut store, op);
            prop_assert!(store.len() <= max_entries, "{} > {}", store.len(), max_entries);
        }
    }

    // Byte usage never exceeds the budget, and always equals the sum of live sizes
    #[test]
    fn prop_memory_limit_holds(
        max_memory in 50usize..600,
        ops in prop::collection::vec(cache_op_strategy(), 1..120)
    ) {
        let mut store = cache(1_000, max_memory);

        for op in ops {
            apply(&mut store, op);
            prop_assert!(store.memory_usage() <= max_memory);
            let live: usize = store.values().iter().map(String::len).sum();
            prop_assert_eq!(live, store.memory_usage());
        }
    }

    // Recency order tracks exactly the live keys
    #[test]
    fn prop_recency_matches_entries(ops in prop::collection::vec(cache_op_strategy(), 1..120)) {
        let mut store = cache(6, 400);

        for op in ops {
            apply(&mut store, op);
            let keys = store.keys();
            let unique: HashSet<&String> = keys.iter().collect();
            prop_assert_eq!(unique.len(), keys.len(), "duplicate key in recency order");
            prop_assert_eq!(keys.len(), store.len());
        }
    }

    // Statistics account for every read
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let mut store = cache(5, 500);
        let mut expected_hits = 0u64;
        let mut expected_misses = 0u64;

        for op in ops {
            match op {
                CacheOp::Get { key } => match store.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                other => apply(&mut store, other),
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits);
        prop_assert_eq!(stats.misses, expected_misses);
        prop_assert_eq!(stats.entries, store.len());
    }

    // An oversized value is refused and leaves the cache untouched
    #[test]
    fn prop_oversized_value_rejected(
        fill in prop::collection::vec((key_strategy(), value_strategy()), 0..20),
        extra in 1usize..100
    ) {
        let max_memory = 300;
        let mut store = cache(50, max_memory);
        for (key, value) in fill {
            let _ = store.set(key, value, None);
        }
        let len_before = store.len();
        let bytes_before = store.memory_usage();
        let keys_before = store.keys();

        let result = store.set("oversized".to_string(), "x".repeat(max_memory + extra), None);

        prop_assert_eq!(result, Err(CacheError::Rejected { size: max_memory + extra, max: max_memory }));
        prop_assert_eq!(store.len(), len_before);
        prop_assert_eq!(store.memory_usage(), bytes_before);
        prop_assert_eq!(store.keys(), keys_before);
    }

    // Pressure release reaches its target by evicting the oldest keys first
    #[test]
    fn prop_release_evicts_lru_first(
        sizes in prop::collection::vec(1usize..40, 1..30),
        target in 0usize..400
    ) {
        let mut store = cache(100, 10_000);
        for (i, size) in sizes.iter().enumerate() {
            store.set(format!("k{i:02}"), "x".repeat(*size), None).unwrap();
        }
        let before = store.keys();

        let evicted = store.release_memory_pressure(Some(target));

        let after = store.keys();
        prop_assert!(store.memory_usage() <= target || store.is_empty());
        prop_assert_eq!(&after[..], &before[evicted..]);
    }

    // After reading a key, inserting into a full cache never evicts it
    #[test]
    fn prop_lru_access_tracking(
        keys in prop::collection::hash_set("[a-z]{3,6}", 3..8),
        pick in any::<prop::sample::Index>()
    ) {
        let keys: Vec<String> = keys.into_iter().collect();
        let capacity = keys.len();
        let mut store = cache(capacity, 10_000);
        for key in &keys {
            store.set(key.clone(), "v".to_string(), None).unwrap();
        }

        let accessed = pick.get(&keys).clone();
        prop_assert!(store.get(&accessed).is_some());
        store.set("NEW".to_string(), "v".to_string(), None).unwrap();

        prop_assert_eq!(store.len(), capacity);
        prop_assert!(store.has(&accessed), "recently read key {} was evicted", accessed);
    }
}

// Separate proptest block with fewer cases for time-sensitive TTL tests
proptest! {
    #![proptest_config(ProptestConfig::with_cases(5))]

    #[test]
    fn prop_ttl_expiration_behavior(key in key_strategy(), value in value_strategy()) {
        let mut store = BoundedCache::with_estimator(
            BoundedCacheConfig {
                max_entries: 10,
                max_memory_bytes: 1_000,
                ttl: Some(Duration::from_millis(100)),
            },
            Arc::new(|v: &String| v.len()),
        );
        store.set(key.clone(), value.clone(), None).unwrap();
        prop_assert_eq!(store.get(&key), Some(value));

        sleep(Duration::from_millis(150));

        prop_assert_eq!(store.get(&key), None);
        prop_assert!(store.is_empty());
        prop_assert_eq!(store.memory_usage(), 0);
    }
}

#[test]
fn test_lru_scenario_two_entries() {
    let mut store = cache(2, 1_000);

    store.set("A".to_string(), "a".to_string(), None).unwrap();
    store.set("B".to_string(), "b".to_string(), None).unwrap();
    store.get("A");
    store.set("C".to_string(), "c".to_string(), None).unwrap();

    assert!(store.has("A"));
    assert!(!store.has("B"));
    assert!(store.has("C"));
}
