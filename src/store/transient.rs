//! Transient Store Module
//!
//! Expiring key-value cache over one table of a storage engine. Every bundle
//! is persisted through the engine, cached in memory and removed again by its
//! own timer once the TTL elapses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::cache_key::{construct_cache_key, extract_primary_key};
use super::events::{EventBus, Topic};
use super::{Bundle, CachedBundle, ExpiredBundle, StoreStats};
use crate::engine::CrudEngine;
use crate::error::{Result, StoreError};
use crate::tasks::spawn_expiration_timer;

// == Store State ==
/// Everything guarded by the store lock.
#[derive(Debug, Default)]
struct State {
    table: Option<String>,
    bundles: HashMap<String, CachedBundle>,
    stats: StoreStats,
}

impl State {
    fn table(&self) -> Result<String> {
        self.table.clone().ok_or(StoreError::TableNotBound)
    }

    fn refresh_live_entries(&mut self) {
        let count = self.bundles.len();
        self.stats.set_live_entries(count);
    }
}

struct Inner {
    engine: Arc<dyn CrudEngine>,
    state: Mutex<State>,
    events: EventBus,
    next_generation: AtomicU64,
}

// == Transient Store ==
/// Expiring cache bound to one table of a [`CrudEngine`].
///
/// A key can only be set while no live entry occupies it. Entries disappear
/// from cache and engine together when their timer fires, and an
/// [`Topic::Expired`] event is published afterwards.
///
/// Cloning yields another handle to the same store. Timers do not keep the
/// store alive; dropping the last handle aborts them all.
#[derive(Clone)]
pub struct TransientStore {
    inner: Arc<Inner>,
}

impl TransientStore {
    // == Constructors ==
    /// Creates a store with no table bound; call [`init`](Self::init) next.
    pub fn new(engine: Arc<dyn CrudEngine>) -> Self {
        Self::from_state(engine, State::default())
    }

    /// Creates a store bound to `table` without loading anything.
    ///
    /// Lookups fall through to the engine until [`init`](Self::init) warms
    /// the cache.
    pub fn with_table(engine: Arc<dyn CrudEngine>, table: impl Into<String>) -> Self {
        let state = State {
            table: Some(table.into()),
            ..State::default()
        };
        Self::from_state(engine, state)
    }

    fn from_state(engine: Arc<dyn CrudEngine>, state: State) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                state: Mutex::new(state),
                events: EventBus::new(),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    // == Init ==
    /// Binds `table` and rebuilds the cache from the engine.
    ///
    /// Bundles whose expiration already passed are expired on the spot (an
    /// event fires, no timer is armed); all others are cached with a timer
    /// for their remaining lifetime. Returns every bundle that was read.
    /// Any previous cache content is discarded first.
    ///
    /// Every record is read before anything changes: a failed read leaves the
    /// cache, the bound table and the engine as they were.
    pub async fn init(&self, table: &str) -> Result<Vec<Bundle>> {
        let engine = &self.inner.engine;
        let mut state = self.inner.state.lock().await;

        let primary_keys = engine.read_all_primary_keys(table).await?;

        let mut records = Vec::with_capacity(primary_keys.len());
        for primary_key in primary_keys {
            let Some(record) = engine.read(table, &primary_key).await? else {
                continue;
            };

            match Bundle::from_value(record) {
                Ok(bundle) => records.push((primary_key, bundle)),
                Err(err) => {
                    warn!(table, primary_key = %primary_key, error = %err, "skipping record that is not a bundle");
                }
            }
        }

        state.bundles.clear();
        state.table = Some(table.to_string());

        let mut loaded = Vec::with_capacity(records.len());
        let mut expired = Vec::new();

        for (primary_key, bundle) in records {
            if bundle.is_expired() {
                if let Err(err) = engine.delete(table, &primary_key).await {
                    warn!(table, primary_key = %primary_key, error = %err, "failed to remove expired record");
                }
                state.stats.record_expiration();
                expired.push(ExpiredBundle::new(primary_key, bundle.clone()));
            } else {
                let cache_key = construct_cache_key(table, &primary_key);
                let generation = self.inner.next_generation();
                let mut cached = CachedBundle::new(bundle.clone(), generation);
                cached.arm(self.spawn_timer(cache_key.clone(), generation, bundle.ttl_remaining()));
                state.bundles.insert(cache_key, cached);
            }

            loaded.push(bundle);
        }

        state.refresh_live_entries();
        let live = state.bundles.len();
        drop(state);

        for bundle in &expired {
            self.inner.events.emit_expired(bundle);
        }

        info!(
            table,
            loaded = loaded.len(),
            live,
            expired = expired.len(),
            "transient store initialized"
        );
        Ok(loaded)
    }

    // == Set ==
    /// Stores `payload` under `primary_key` for `ttl`.
    ///
    /// Fails with [`StoreError::RecordAlreadyExists`] while a live entry
    /// occupies the key; the existing entry and its timer stay untouched.
    /// Resolves once the bundle is persisted, cached and its timer armed.
    pub async fn set(&self, primary_key: &str, payload: Value, ttl: Duration) -> Result<Bundle> {
        let mut state = self.inner.state.lock().await;
        let table = state.table()?;
        let cache_key = construct_cache_key(&table, primary_key);

        if state.bundles.contains_key(&cache_key) {
            return Err(StoreError::RecordAlreadyExists {
                key: primary_key.to_string(),
                table,
                store: self.inner.engine.store_name().to_string(),
            });
        }

        let bundle = Bundle::new(payload, ttl);
        self.inner
            .engine
            .create(&table, primary_key, bundle.to_value()?)
            .await?;

        let generation = self.inner.next_generation();
        let mut cached = CachedBundle::new(bundle.clone(), generation);
        cached.arm(self.spawn_timer(cache_key.clone(), generation, ttl));
        state.bundles.insert(cache_key, cached);
        state.refresh_live_entries();

        debug!(table = %table, primary_key, expires = bundle.expires, "bundle stored");
        Ok(bundle)
    }

    // == Get ==
    /// Looks up a bundle, cache first.
    ///
    /// On a cache miss the engine is read directly. Such a read neither fills
    /// the cache nor arms a timer.
    pub async fn get(&self, primary_key: &str) -> Result<Option<Bundle>> {
        let mut state = self.inner.state.lock().await;
        let table = state.table()?;
        let cache_key = construct_cache_key(&table, primary_key);

        if let Some(cached) = state.bundles.get(&cache_key) {
            let bundle = cached.bundle().clone();
            state.stats.record_hit();
            return Ok(Some(bundle));
        }

        match self.inner.engine.read(&table, primary_key).await? {
            Some(record) => {
                let bundle = Bundle::from_value(record)?;
                state.stats.record_fallthrough();
                Ok(Some(bundle))
            }
            None => {
                state.stats.record_miss();
                Ok(None)
            }
        }
    }

    // == Delete ==
    /// Removes a bundle from engine and cache and cancels its timer.
    ///
    /// No event is published. Deleting an unknown key succeeds.
    pub async fn delete(&self, primary_key: &str) -> Result<String> {
        let mut state = self.inner.state.lock().await;
        let table = state.table()?;

        self.inner.engine.delete(&table, primary_key).await?;

        // Dropping the entry aborts its timer.
        if state
            .bundles
            .remove(&construct_cache_key(&table, primary_key))
            .is_some()
        {
            debug!(table = %table, primary_key, "bundle deleted");
        }
        state.refresh_live_entries();

        Ok(primary_key.to_string())
    }

    // == Events ==
    /// Registers a synchronous listener for `topic`.
    ///
    /// Listeners run in registration order right after the expired bundle was
    /// removed from cache and engine.
    pub fn on<F>(&self, topic: Topic, listener: F)
    where
        F: Fn(&ExpiredBundle) + Send + Sync + 'static,
    {
        self.inner.events.on(topic, listener);
    }

    /// Returns a receiver for expiration events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ExpiredBundle> {
        self.inner.events.subscribe()
    }

    // == Introspection ==
    /// Returns true if a live entry for `primary_key` has an armed timer.
    pub async fn is_armed(&self, primary_key: &str) -> bool {
        let state = self.inner.state.lock().await;
        let Some(table) = state.table.as_deref() else {
            return false;
        };
        state
            .bundles
            .get(&construct_cache_key(table, primary_key))
            .is_some_and(CachedBundle::is_armed)
    }

    /// Name of the bound table, if any.
    pub async fn table_name(&self) -> Option<String> {
        self.inner.state.lock().await.table.clone()
    }

    /// Returns current store statistics.
    pub async fn stats(&self) -> StoreStats {
        self.inner.state.lock().await.stats.clone()
    }

    /// Returns the number of live cache entries.
    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.bundles.len()
    }

    /// Returns true if the cache holds no live entry.
    pub async fn is_empty(&self) -> bool {
        self.inner.state.lock().await.bundles.is_empty()
    }

    /// The engine bundles are persisted to.
    pub fn engine(&self) -> &Arc<dyn CrudEngine> {
        &self.inner.engine
    }

    fn spawn_timer(&self, cache_key: String, generation: u64, delay: Duration) -> JoinHandle<()> {
        let store: Weak<Inner> = Arc::downgrade(&self.inner);
        let key = cache_key.clone();

        spawn_expiration_timer(cache_key, delay, async move {
            // The store is gone: nothing left to expire.
            if let Some(inner) = store.upgrade() {
                inner.expire(&key, generation).await;
            }
        })
    }
}

impl Inner {
    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    // == Expire ==
    /// Removes an entry whose timer fired and publishes the expiration.
    ///
    /// Only the timer of the current generation may remove the entry. The
    /// durable delete is best effort: a failure is logged and the event is
    /// still published.
    async fn expire(&self, cache_key: &str, generation: u64) {
        let mut state = self.state.lock().await;

        let Some(table) = state.table.clone() else {
            return;
        };
        let is_current = state
            .bundles
            .get(cache_key)
            .is_some_and(|cached| cached.generation() == generation);
        if !is_current {
            return;
        }
        let Some(primary_key) = extract_primary_key(&table, cache_key).map(str::to_string) else {
            return;
        };
        let Some(mut cached) = state.bundles.remove(cache_key) else {
            return;
        };

        // This task is the timer; dropping its handle must not abort it.
        let _ = cached.release_timer();
        let expired = ExpiredBundle::new(primary_key.clone(), cached.bundle().clone());

        if let Err(err) = self.engine.delete(&table, &primary_key).await {
            warn!(table = %table, primary_key = %primary_key, error = %err, "failed to remove expired record");
        }

        state.stats.record_expiration();
        state.refresh_live_entries();
        drop(state);

        debug!(table = %table, primary_key = %primary_key, "bundle expired");
        self.events.emit_expired(&expired);
    }
}

impl std::fmt::Debug for TransientStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransientStore")
            .field("store_name", &self.inner.engine.store_name())
            .field("events", &self.inner.events)
            .finish()
    }
}
