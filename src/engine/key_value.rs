//! Key-Value Engine
//!
//! Maps tables onto a flat string key/value area, the way browser
//! `localStorage` is used: each record lives under
//! `<store_name>@<table>@<primary_key>` with its JSON text as value.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::{shallow_merge, CrudEngine};
use crate::error::{Result, StoreError};

/// Separator between store name, table and primary key.
pub const KEY_SEPARATOR: char = '@';

// == Key-Value Area ==
/// Shared flat string storage, cheap to clone.
///
/// Several engines with different store names can share one area.
#[derive(Debug, Clone, Default)]
pub struct KeyValueArea {
    items: Arc<RwLock<BTreeMap<String, String>>>,
}

impl KeyValueArea {
    /// Creates an empty area.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value stored under `key`.
    pub async fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().await.get(key).cloned()
    }

    /// Stores a raw value under `key`, replacing any previous one.
    pub async fn set_item(&self, key: impl Into<String>, value: impl Into<String>) {
        self.items.write().await.insert(key.into(), value.into());
    }

    /// Removes the value stored under `key`.
    pub async fn remove_item(&self, key: &str) {
        self.items.write().await.remove(key);
    }

    /// Drops every item.
    pub async fn clear(&self) {
        self.items.write().await.clear();
    }

    /// Number of items across all stores.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Returns true if the area holds no item.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

// == Key-Value Engine ==
/// CRUD engine storing JSON text in a [`KeyValueArea`].
#[derive(Debug, Clone)]
pub struct KeyValueEngine {
    store_name: String,
    area: KeyValueArea,
}

impl KeyValueEngine {
    /// Creates an engine with its own private area.
    pub fn new(store_name: impl Into<String>) -> Self {
        Self::with_area(store_name, KeyValueArea::new())
    }

    /// Creates an engine writing into a shared area.
    pub fn with_area(store_name: impl Into<String>, area: KeyValueArea) -> Self {
        Self {
            store_name: store_name.into(),
            area,
        }
    }

    /// The backing area.
    pub fn area(&self) -> &KeyValueArea {
        &self.area
    }

    /// Builds the flat key of a record.
    pub fn item_key(&self, table: &str, primary_key: &str) -> String {
        format!("{}{}", self.table_prefix(table), primary_key)
    }

    /// Rejects table names whose prefix would also match another table.
    fn validate_table(table: &str) -> Result<()> {
        if table.contains(KEY_SEPARATOR) {
            return Err(StoreError::PathValidation(format!(
                "Table name \"{}\" must not contain '{}'",
                table, KEY_SEPARATOR
            )));
        }
        Ok(())
    }

    fn table_prefix(&self, table: &str) -> String {
        format!(
            "{}{sep}{}{sep}",
            self.store_name,
            table,
            sep = KEY_SEPARATOR
        )
    }
}

#[async_trait]
impl CrudEngine for KeyValueEngine {
    fn store_name(&self) -> &str {
        &self.store_name
    }

    async fn create(&self, table: &str, primary_key: &str, entity: Value) -> Result<String> {
        Self::validate_table(table)?;
        let text = serde_json::to_string(&entity)?;
        self.area
            .set_item(self.item_key(table, primary_key), text)
            .await;
        Ok(primary_key.to_string())
    }

    async fn read(&self, table: &str, primary_key: &str) -> Result<Option<Value>> {
        Self::validate_table(table)?;
        match self.area.get_item(&self.item_key(table, primary_key)).await {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    async fn read_all(&self, table: &str) -> Result<Vec<Value>> {
        Self::validate_table(table)?;
        let prefix = self.table_prefix(table);
        let items = self.area.items.read().await;

        items
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, text)| serde_json::from_str(text).map_err(StoreError::from))
            .collect()
    }

    async fn read_all_primary_keys(&self, table: &str) -> Result<Vec<String>> {
        Self::validate_table(table)?;
        let prefix = self.table_prefix(table);
        let items = self.area.items.read().await;

        Ok(items
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .map(str::to_string)
            .collect())
    }

    async fn delete(&self, table: &str, primary_key: &str) -> Result<String> {
        Self::validate_table(table)?;
        self.area
            .remove_item(&self.item_key(table, primary_key))
            .await;
        Ok(primary_key.to_string())
    }

    async fn delete_all(&self, table: &str) -> Result<bool> {
        Self::validate_table(table)?;
        let prefix = self.table_prefix(table);
        let mut items = self.area.items.write().await;

        let before = items.len();
        items.retain(|key, _| !key.starts_with(&prefix));
        debug!(table, removed = before - items.len(), "table cleared");
        Ok(true)
    }

    async fn update(&self, table: &str, primary_key: &str, changes: Value) -> Result<String> {
        Self::validate_table(table)?;
        let record = self
            .read(table, primary_key)
            .await?
            .ok_or_else(|| StoreError::RecordNotFound {
                table: table.to_string(),
                key: primary_key.to_string(),
            })?;

        let merged = shallow_merge(record, changes)?;
        self.create(table, primary_key, merged).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DATABASE_NAME: &str = "database-name";
    const TABLE_NAME: &str = "table-name";

    #[tokio::test]
    async fn test_item_key_layout() {
        let engine = KeyValueEngine::new(DATABASE_NAME);
        assert_eq!(
            engine.item_key(TABLE_NAME, "primary-key"),
            "database-name@table-name@primary-key"
        );
    }

    #[tokio::test]
    async fn test_create_stores_json_text() {
        let engine = KeyValueEngine::new(DATABASE_NAME);

        engine
            .create(TABLE_NAME, "primary-key", json!({"some": "value"}))
            .await
            .unwrap();

        let raw = engine
            .area()
            .get_item("database-name@table-name@primary-key")
            .await
            .unwrap();
        assert_eq!(raw, r#"{"some":"value"}"#);
    }

    #[tokio::test]
    async fn test_reads_seeded_items() {
        let area = KeyValueArea::new();
        area.set_item("database-name@table-name@123", r#"{"token":"123"}"#)
            .await;
        let engine = KeyValueEngine::with_area(DATABASE_NAME, area);

        let record = engine.read(TABLE_NAME, "123").await.unwrap();
        assert_eq!(record, Some(json!({"token": "123"})));
    }

    #[tokio::test]
    async fn test_stores_are_isolated_in_shared_area() {
        let area = KeyValueArea::new();
        let first = KeyValueEngine::with_area("first", area.clone());
        let second = KeyValueEngine::with_area("second", area.clone());

        first.create(TABLE_NAME, "a", json!(1)).await.unwrap();
        second.create(TABLE_NAME, "b", json!(2)).await.unwrap();

        assert_eq!(
            first.read_all_primary_keys(TABLE_NAME).await.unwrap(),
            vec!["a".to_string()]
        );
        assert!(first.delete_all(TABLE_NAME).await.unwrap());
        assert_eq!(area.len().await, 1);
        assert_eq!(second.read(TABLE_NAME, "b").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_tables_do_not_overlap() {
        let engine = KeyValueEngine::new(DATABASE_NAME);
        engine.create("a", "x", json!(1)).await.unwrap();

        let nested = engine.create("a@b", "c", json!(2)).await;
        assert!(matches!(nested, Err(StoreError::PathValidation(_))));

        for result in [
            engine.read_all_primary_keys("a@b").await.map(|_| ()),
            engine.read("a@b", "c").await.map(|_| ()),
            engine.delete_all("a@b").await.map(|_| ()),
            engine.update("a@b", "c", json!({})).await.map(|_| ()),
        ] {
            assert!(matches!(result, Err(StoreError::PathValidation(_))));
        }

        assert_eq!(
            engine.read_all_primary_keys("a").await.unwrap(),
            vec!["x".to_string()]
        );
        assert!(engine.delete_all("a").await.unwrap());
        assert!(engine.area().is_empty().await);
    }

    #[tokio::test]
    async fn test_primary_key_with_separator() {
        let engine = KeyValueEngine::new(DATABASE_NAME);

        engine
            .create(TABLE_NAME, "@access@tokens", json!({"a": 1}))
            .await
            .unwrap();

        let keys = engine.read_all_primary_keys(TABLE_NAME).await.unwrap();
        assert_eq!(keys, vec!["@access@tokens".to_string()]);
    }

    #[tokio::test]
    async fn test_read_corrupt_item_is_serialization_error() {
        let engine = KeyValueEngine::new(DATABASE_NAME);
        engine
            .area()
            .set_item(engine.item_key(TABLE_NAME, "bad"), "{not json")
            .await;

        let result = engine.read(TABLE_NAME, "bad").await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
