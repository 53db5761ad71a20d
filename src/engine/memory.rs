//! Memory Engine
//!
//! Keeps every table in process memory. Records are listed in insertion
//! order; overwriting a record keeps its original position.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{shallow_merge, CrudEngine};
use crate::error::{Result, StoreError};

type Table = Vec<(String, Value)>;

// == Memory Engine ==
/// CRUD engine holding records in memory only.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    store_name: String,
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryEngine {
    /// Creates an empty engine.
    pub fn new(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
            tables: RwLock::new(HashMap::new()),
        }
    }
}

fn position(table: &Table, primary_key: &str) -> Option<usize> {
    table.iter().position(|(key, _)| key == primary_key)
}

#[async_trait]
impl CrudEngine for MemoryEngine {
    fn store_name(&self) -> &str {
        &self.store_name
    }

    async fn create(&self, table: &str, primary_key: &str, entity: Value) -> Result<String> {
        let mut tables = self.tables.write().await;
        let records = tables.entry(table.to_string()).or_default();

        match position(records, primary_key) {
            Some(index) => records[index].1 = entity,
            None => records.push((primary_key.to_string(), entity)),
        }
        Ok(primary_key.to_string())
    }

    async fn read(&self, table: &str, primary_key: &str) -> Result<Option<Value>> {
        let tables = self.tables.read().await;
        Ok(tables.get(table).and_then(|records| {
            position(records, primary_key).map(|index| records[index].1.clone())
        }))
    }

    async fn read_all(&self, table: &str) -> Result<Vec<Value>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|records| records.iter().map(|(_, value)| value.clone()).collect())
            .unwrap_or_default())
    }

    async fn read_all_primary_keys(&self, table: &str) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|records| records.iter().map(|(key, _)| key.clone()).collect())
            .unwrap_or_default())
    }

    async fn delete(&self, table: &str, primary_key: &str) -> Result<String> {
        let mut tables = self.tables.write().await;
        if let Some(records) = tables.get_mut(table) {
            records.retain(|(key, _)| key != primary_key);
        }
        Ok(primary_key.to_string())
    }

    async fn delete_all(&self, table: &str) -> Result<bool> {
        self.tables.write().await.remove(table);
        Ok(true)
    }

    async fn update(&self, table: &str, primary_key: &str, changes: Value) -> Result<String> {
        let mut tables = self.tables.write().await;
        let records = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::RecordNotFound {
                table: table.to_string(),
                key: primary_key.to_string(),
            })?;
        let index = position(records, primary_key).ok_or_else(|| StoreError::RecordNotFound {
            table: table.to_string(),
            key: primary_key.to_string(),
        })?;

        records[index].1 = shallow_merge(records[index].1.clone(), changes)?;
        Ok(primary_key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insertion_order() {
        let engine = MemoryEngine::new("memory");

        for key in ["marge", "homer", "lisa"] {
            engine.create("simpsons", key, json!({"name": key})).await.unwrap();
        }
        engine
            .create("simpsons", "homer", json!({"name": "Homer J."}))
            .await
            .unwrap();

        let keys = engine.read_all_primary_keys("simpsons").await.unwrap();
        assert_eq!(keys, vec!["marge", "homer", "lisa"]);

        let records = engine.read_all("simpsons").await.unwrap();
        assert_eq!(records[1]["name"], "Homer J.");
    }

    #[tokio::test]
    async fn test_unknown_table_is_empty() {
        let engine = MemoryEngine::new("memory");
        assert!(engine.read_all_primary_keys("nothing").await.unwrap().is_empty());
        assert!(engine.read("nothing", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_in_place() {
        let engine = MemoryEngine::new("memory");
        engine
            .create("monitors", "m1", json!({"name": "Old monitor"}))
            .await
            .unwrap();

        engine
            .update("monitors", "m1", json!({"age": 177}))
            .await
            .unwrap();

        let record = engine.read("monitors", "m1").await.unwrap().unwrap();
        assert_eq!(record, json!({"name": "Old monitor", "age": 177}));
    }

    #[tokio::test]
    async fn test_failed_update_keeps_record() {
        let engine = MemoryEngine::new("memory");
        engine.create("t", "k", json!({"a": 1})).await.unwrap();

        let result = engine.update("t", "k", json!("not an object")).await;
        assert!(matches!(result, Err(StoreError::RecordType(_))));
        assert_eq!(engine.read("t", "k").await.unwrap(), Some(json!({"a": 1})));
    }
}
