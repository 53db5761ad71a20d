//! Store Statistics Module
//!
//! Tracks cache hits, store fall-through reads, misses and expirations.

use serde::Serialize;

// == Store Stats ==
/// Tracks transient store activity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    /// Lookups answered from the in-memory cache
    pub hits: u64,
    /// Lookups answered by a durable read after a cache miss
    pub fallthroughs: u64,
    /// Lookups that found nothing in cache or engine
    pub misses: u64,
    /// Bundles removed because their TTL elapsed
    pub expirations: u64,
    /// Current number of live cache entries
    pub live_entries: usize,
}

impl StoreStats {
    // == Constructor ==
    /// Creates a new StoreStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Share of lookups answered from the cache.
    ///
    /// Returns 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.fallthroughs + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_fallthrough(&mut self) {
        self.fallthroughs += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    pub fn set_live_entries(&mut self, count: usize) {
        self.live_entries = count;
    }
}
