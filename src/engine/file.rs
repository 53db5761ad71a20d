//! File Engine
//!
//! Stores one record per file at `<root>/<table>/<primary_key>.dat`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, warn};

use super::{shallow_merge, validate_segment, validate_segments, CrudEngine};
use crate::error::{Result, StoreError};

/// Extension appended to every record file.
pub const FILE_EXTENSION: &str = "dat";

// == File Engine ==
/// CRUD engine backed by a directory tree.
///
/// String payloads are written as raw text, everything else as JSON. Reads
/// parse JSON first and fall back to the raw text.
#[derive(Debug, Clone)]
pub struct FileEngine {
    root: PathBuf,
    store_name: String,
}

impl FileEngine {
    /// Creates an engine rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let store_name = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { root, store_name }
    }

    /// Root directory of this engine.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves the file of a record after validating both segments.
    pub fn resolve_path(&self, table: &str, primary_key: &str) -> Result<PathBuf> {
        validate_segments(&[table, primary_key])?;
        Ok(self
            .root
            .join(table)
            .join(format!("{}.{}", primary_key, FILE_EXTENSION)))
    }

    fn table_dir(&self, table: &str) -> Result<PathBuf> {
        validate_segment(table)?;
        Ok(self.root.join(table))
    }
}

fn encode(entity: &Value) -> Result<String> {
    match entity {
        Value::String(text) => Ok(text.clone()),
        other => Ok(serde_json::to_string(other)?),
    }
}

fn decode(contents: String) -> Value {
    serde_json::from_str(&contents).unwrap_or(Value::String(contents))
}

#[async_trait]
impl CrudEngine for FileEngine {
    fn store_name(&self) -> &str {
        &self.store_name
    }

    async fn create(&self, table: &str, primary_key: &str, entity: Value) -> Result<String> {
        let file = self.resolve_path(table, primary_key)?;
        let contents = encode(&entity)?;

        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&file, contents).await?;

        debug!(table, primary_key, "record written");
        Ok(primary_key.to_string())
    }

    async fn read(&self, table: &str, primary_key: &str) -> Result<Option<Value>> {
        let file = self.resolve_path(table, primary_key)?;

        match fs::read_to_string(&file).await {
            Ok(contents) => Ok(Some(decode(contents))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn read_all(&self, table: &str) -> Result<Vec<Value>> {
        let primary_keys = self.read_all_primary_keys(table).await?;

        let mut records = Vec::with_capacity(primary_keys.len());
        for primary_key in primary_keys {
            if let Some(record) = self.read(table, &primary_key).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn read_all_primary_keys(&self, table: &str) -> Result<Vec<String>> {
        let directory = self.table_dir(table)?;

        let mut entries = match fs::read_dir(&directory).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut primary_keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                primary_keys.push(stem.to_string());
            }
        }

        primary_keys.sort();
        Ok(primary_keys)
    }

    async fn delete(&self, table: &str, primary_key: &str) -> Result<String> {
        let file = self.resolve_path(table, primary_key)?;

        match fs::remove_file(&file).await {
            Ok(()) => debug!(table, primary_key, "record removed"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(primary_key.to_string())
    }

    async fn delete_all(&self, table: &str) -> Result<bool> {
        let directory = self.table_dir(table)?;

        match fs::remove_dir_all(&directory).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(true),
            Err(err) => {
                warn!(table, error = %err, "failed to remove table directory");
                Ok(false)
            }
        }
    }

    async fn update(&self, table: &str, primary_key: &str, changes: Value) -> Result<String> {
        validate_segments(&[table, primary_key])?;

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
