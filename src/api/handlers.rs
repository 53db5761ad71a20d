//! API Handlers
//!
//! HTTP request handlers for each transient store endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::config::Config;
use crate::engine::{CrudEngine, FileEngine, MemoryEngine};
use crate::error::{Result, StoreError};
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse, StatsResponse,
};
use crate::store::{Topic, TransientStore};

/// Application state shared across all handlers.
///
/// The transient store is internally synchronized, so cloning the state is
/// cheap and every handler works on the same cache.
#[derive(Clone)]
pub struct AppState {
    /// Transient store bound to the configured table
    pub store: TransientStore,
    /// TTL applied when a request does not carry one
    pub default_ttl: Duration,
}

impl AppState {
    /// Creates a new AppState around an initialized store.
    pub fn new(store: TransientStore, default_ttl: Duration) -> Self {
        Self { store, default_ttl }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Picks the file engine when a data directory is configured, the memory
    /// engine otherwise, and warm-loads the configured table.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let engine: Arc<dyn CrudEngine> = match &config.data_dir {
            Some(dir) => Arc::new(FileEngine::new(dir.join(&config.store_name))),
            None => Arc::new(MemoryEngine::new(config.store_name.clone())),
        };

        let store = TransientStore::new(engine);
        store.on(Topic::Expired, |expired| {
            info!(primary_key = %expired.primary_key, "bundle expired");
        });
        store.init(&config.table_name).await?;

        Ok(Self::new(store, config.default_ttl()))
    }
}

/// Handler for PUT /set
///
/// Stores a payload under a key for the requested TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(StoreError::InvalidRequest(error_msg));
    }

    let ttl = req
        .ttl
        .map(Duration::from_millis)
        .unwrap_or(state.default_ttl);
    let bundle = state.store.set(&req.key, req.payload, ttl).await?;

    Ok(Json(SetResponse::new(req.key, bundle.expires)))
}

/// Handler for GET /get/:key
///
/// Retrieves a bundle by key.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.store.get(&key).await? {
        Some(bundle) => Ok(Json(GetResponse::new(key, bundle))),
        None => Err(StoreError::RecordNotFound {
            table: state.store.table_name().await.unwrap_or_default(),
            key,
        }),
    }
}

/// Handler for DELETE /del/:key
///
/// Deletes a bundle without publishing an expiration.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let key = state.store.delete(&key).await?;
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.store.stats().await))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
