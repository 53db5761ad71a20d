//! Storage Engine Module
//!
//! Defines the CRUD contract every backend implements, plus the backends
//! shipped with the crate.
//!
//! # Backends
//! - [`FileEngine`] - one file per record below a root directory
//! - [`KeyValueEngine`] - flat string key/value area with prefixed keys
//! - [`MemoryEngine`] - in-process tables kept in insertion order

mod file;
mod key_value;
mod memory;
mod validate;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

pub use file::{FileEngine, FILE_EXTENSION};
pub use key_value::{KeyValueArea, KeyValueEngine, KEY_SEPARATOR};
pub use memory::MemoryEngine;
pub use validate::{validate_segment, validate_segments};

// == CRUD Engine ==
/// Asynchronous CRUD contract over one storage backend.
///
/// Records are addressed by a table name and a primary key. A missing record
/// is reported as `Ok(None)` by [`read`](CrudEngine::read), never as an error.
/// Implementations must be usable as `Arc<dyn CrudEngine>`.
#[async_trait]
pub trait CrudEngine: Send + Sync {
    /// Name of the database this engine writes to.
    fn store_name(&self) -> &str;

    /// Writes or overwrites a record and returns its primary key.
    async fn create(&self, table: &str, primary_key: &str, entity: Value) -> Result<String>;

    /// Reads a record, `None` when it does not exist.
    async fn read(&self, table: &str, primary_key: &str) -> Result<Option<Value>>;

    /// Reads every record of a table in the engine's listing order.
    async fn read_all(&self, table: &str) -> Result<Vec<Value>>;

    /// Lists the primary keys of a table, empty for unknown tables.
    async fn read_all_primary_keys(&self, table: &str) -> Result<Vec<String>>;

    /// Removes a record. Deleting a missing record succeeds.
    async fn delete(&self, table: &str, primary_key: &str) -> Result<String>;

    /// Removes a whole table. Removing a missing table succeeds.
    async fn delete_all(&self, table: &str) -> Result<bool>;

    /// Shallow-merges `changes` into an existing record and persists it.
    async fn update(&self, table: &str, primary_key: &str, changes: Value) -> Result<String>;
}

// == Shallow Merge ==
/// Merges the top-level fields of `changes` into `record`.
///
/// Both sides must be JSON objects. Fields of `changes` replace fields of the
/// same name in `record`; nested objects are replaced, not merged.
pub(crate) fn shallow_merge(record: Value, changes: Value) -> Result<Value> {
    let mut merged: Map<String, Value> = match record {
        Value::Object(map) => map,
        other => {
            return Err(StoreError::RecordType(format!(
                "stored record is not an object: {}",
                other
            )))
        }
    };

    match changes {
        Value::Object(changes) => {
            for (field, value) in changes {
                merged.insert(field, value);
            }
        }
        other => {
            return Err(StoreError::RecordType(format!(
                "changes are not an object: {}",
                other
            )))
        }
    }

    Ok(Value::Object(merged))
}
