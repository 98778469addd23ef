//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check store behavior over generated keys and payloads.

use proptest::prelude::*;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use crate::cache::{CacheStore, MemoryStorage};

// == Test Configuration ==
const TEST_DEFAULT_TTL: Duration = Duration::from_secs(300);

fn new_store() -> (CacheStore, MemoryStorage) {
    let storage = MemoryStorage::new();
    (
        CacheStore::new(Arc::new(storage.clone()), TEST_DEFAULT_TTL),
        storage,
    )
}

// == Strategies ==
/// Generates endpoint paths with an optional query string
fn endpoint_strategy() -> impl Strategy<Value = String> {
    "/api/[a-z]{1,12}(/[0-9]{1,4})?(\\?page=[0-9]{1,2})?"
}

fn method_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("GET"), Just("POST"), Just("PUT"), Just("DELETE")]
}

/// Generates arbitrary JSON documents without floats
fn json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,24}".prop_map(Value::String),
    ];

    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String },
    Get { key: String },
    Invalidate { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    let key = "GET_/api/[a-c]";
    prop_oneof![
        key.prop_map(|key| CacheOp::Set { key }),
        key.prop_map(|key| CacheOp::Get { key }),
        key.prop_map(|key| CacheOp::Invalidate { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // A value written and read back before expiry is returned unchanged.
    #[test]
    fn prop_roundtrip_storage(endpoint in endpoint_strategy(), value in json_strategy()) {
        let (mut store, _) = new_store();
        let key = format!("GET_{}", endpoint);

        store.set(&key, &value, None);

        prop_assert_eq!(store.get::<Value>(&key), Some(value));
    }

    // A fresh store over the same durable backend returns a deep-equal value.
    #[test]
    fn prop_durable_roundtrip(endpoint in endpoint_strategy(), value in json_strategy()) {
        let (mut first, storage) = new_store();
        let key = format!("GET_{}", endpoint);
        first.set(&key, &value, None);
        drop(first);

        let mut restarted = CacheStore::new(Arc::new(storage), TEST_DEFAULT_TTL);
        prop_assert!(!restarted.is_resident(&key));
        prop_assert_eq!(restarted.get::<Value>(&key), Some(value));
        prop_assert!(restarted.is_resident(&key), "Durable hit should be promoted");
    }

    // Entries for different methods on the same URL never shadow each other.
    #[test]
    fn prop_method_isolation(
        endpoint in endpoint_strategy(),
        first in method_strategy(),
        second in method_strategy(),
        a in json_strategy(),
        b in json_strategy()
    ) {
        prop_assume!(first != second);
        let (mut store, _) = new_store();
        let key_a = format!("{}_{}", first, endpoint);
        let key_b = format!("{}_{}", second, endpoint);

        store.set(&key_a, &a, None);
        store.set(&key_b, &b, None);

        prop_assert_eq!(store.get::<Value>(&key_a), Some(a));
        prop_assert_eq!(store.get::<Value>(&key_b), Some(b));
    }

    // Overwriting a key returns the newest value and keeps one entry.
    #[test]
    fn prop_overwrite_semantics(
        endpoint in endpoint_strategy(),
        value1 in json_strategy(),
        value2 in json_strategy()
    ) {
        let (mut store, _) = new_store();
        let key = format!("GET_{}", endpoint);

        store.set(&key, &value1, None);
        store.set(&key, &value2, None);

        prop_assert_eq!(store.get::<Value>(&key), Some(value2));
        prop_assert_eq!(store.len(), 1);
    }

    // Pattern invalidation removes exactly the matching keys from both tiers.
    #[test]
    fn prop_pattern_invalidation(
        endpoints in prop::collection::btree_set(endpoint_strategy(), 1..12),
        prefix in "/api/[a-z]{1,2}"
    ) {
        let (mut store, _) = new_store();
        let pattern = Regex::new(&regex::escape(&prefix)).unwrap();

        for endpoint in &endpoints {
            store.set(&format!("GET_{}", endpoint), &Value::Null, None);
        }
        let expected = endpoints.iter().filter(|e| pattern.is_match(&format!("GET_{}", e))).count();

        let removed = store.invalidate_pattern(&pattern);
        prop_assert_eq!(removed, expected);

        for endpoint in &endpoints {
            let key = format!("GET_{}", endpoint);
            prop_assert_eq!(store.has(&key), !pattern.is_match(&key), "key {}", key);
        }
    }

    // Hit and miss counters reflect every lookup made.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let (mut store, _) = new_store();
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key } => store.set(&key, &Value::Bool(true), None),
                CacheOp::Get { key } => match store.get::<Value>(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Invalidate { key } => store.invalidate(&key),
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.resident_entries, store.len(), "Resident entries mismatch");
    }
}

// Separate proptest block with fewer cases for time-sensitive TTL tests
proptest! {
    #![proptest_config(ProptestConfig::with_cases(5))]

    // After the TTL has elapsed neither `get` nor `has` sees the entry.
    #[test]
    fn prop_ttl_expiration_behavior(endpoint in endpoint_strategy(), value in json_strategy()) {
        let (mut store, storage) = new_store();
        let key = format!("GET_{}", endpoint);

        store.set(&key, &value, Some(Duration::from_millis(40)));
        prop_assert_eq!(store.get::<Value>(&key), Some(value));

        sleep(Duration::from_millis(100));

        prop_assert_eq!(store.get::<Value>(&key), None);
        prop_assert!(!store.has(&key));
        prop_assert!(storage.is_empty());
    }
}
