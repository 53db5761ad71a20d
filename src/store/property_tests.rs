//! Property-Based Tests for the Store and Engines
//!
//! Uses proptest to check cache key encoding, segment validation, engine
//! round-trips and the create-once rule of the transient store.

use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{validate_segment, CrudEngine, MemoryEngine};
use crate::error::StoreError;
use crate::store::cache_key::{construct_cache_key, extract_primary_key};
use crate::store::TransientStore;

// == Test Configuration ==
const TABLE_NAME: &str = "tokens";
const LONG_TTL: Duration = Duration::from_secs(3600);

// == Strategies ==
/// Generates table names without the separator
fn table_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{1,32}".prop_map(|s| s)
}

/// Generates primary keys, separators included
fn primary_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_@-]{1,32}".prop_map(|s| s)
}

#[derive(Debug, Clone)]
enum StoreOp {
    Set { key: String },
    Get { key: String },
    Delete { key: String },
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    // A small key space so operations collide
    let key = "[abc@]{1,2}";
    prop_oneof![
        key.prop_map(|key| StoreOp::Set { key }),
        key.prop_map(|key| StoreOp::Get { key }),
        key.prop_map(|key| StoreOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Extracting the primary key from a cache key gives back the original,
    // even when the primary key itself contains separators.
    #[test]
    fn prop_cache_key_roundtrip(table in table_strategy(), key in primary_key_strategy()) {
        let cache_key = construct_cache_key(&table, &key);
        prop_assert_eq!(extract_primary_key(&table, &cache_key), Some(key.as_str()));
    }

    // Any segment carrying a path separator is rejected.
    #[test]
    fn prop_separators_rejected(prefix in "[a-z]{0,8}", suffix in "[a-z]{0,8}", sep in "[/\\\\]") {
        let segment = format!("{}{}{}", prefix, sep, suffix);
        let rejected = matches!(validate_segment(&segment), Err(StoreError::PathValidation(_)));
        prop_assert!(rejected);
    }

    // Plain segments not starting with a dot are accepted.
    #[test]
    fn prop_plain_segments_accepted(segment in "[a-zA-Z0-9_@-][a-zA-Z0-9_.@-]{0,31}") {
        prop_assert!(validate_segment(&segment).is_ok());
    }

    // N creates on distinct keys give N listed keys, each readable.
    #[test]
    fn prop_engine_roundtrip(keys in prop::collection::hash_set(primary_key_strategy(), 1..20)) {
        tokio_test::block_on(async {
            let engine = MemoryEngine::new("memory");
            for key in &keys {
                engine.create(TABLE_NAME, key, json!({"key": key})).await.unwrap();
            }

            let listed = engine.read_all_primary_keys(TABLE_NAME).await.unwrap();
            assert_eq!(listed.len(), keys.len());
            assert_eq!(engine.read_all(TABLE_NAME).await.unwrap().len(), keys.len());

            for key in &keys {
                let record = engine.read(TABLE_NAME, key).await.unwrap().unwrap();
                assert_eq!(record["key"], json!(key));
            }
        });
    }

    // A set succeeds exactly when no live entry holds the key.
    #[test]
    fn prop_create_once(ops in prop::collection::vec(store_op_strategy(), 1..40)) {
        tokio_test::block_on(async {
            let engine: Arc<dyn CrudEngine> = Arc::new(MemoryEngine::new("memory"));
            let store = TransientStore::new(engine);
            store.init(TABLE_NAME).await.unwrap();
            let mut live: HashSet<String> = HashSet::new();

            for op in ops {
                match op {
                    StoreOp::Set { key } => {
                        let result = store.set(&key, json!(key), LONG_TTL).await;
                        if live.contains(&key) {
                            assert!(matches!(result, Err(StoreError::RecordAlreadyExists { .. })));
                        } else {
                            assert!(result.is_ok());
                            live.insert(key);
                        }
                    }
                    StoreOp::Get { key } => {
                        let found = store.get(&key).await.unwrap();
                        assert_eq!(found.is_some(), live.contains(&key));
                    }
                    StoreOp::Delete { key } => {
                        store.delete(&key).await.unwrap();
                        live.remove(&key);
                    }
                }
            }

            assert_eq!(store.len().await, live.len());
            assert_eq!(store.stats().await.live_entries, live.len());
        });
    }
}
