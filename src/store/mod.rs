//! Store Module
//!
//! Provides the transient store: an expiring in-memory cache persisted
//! through a storage engine.

mod bundle;
pub mod cache_key;
mod events;
mod stats;
mod transient;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use bundle::{current_timestamp_ms, Bundle, CachedBundle, ExpiredBundle};
pub use events::{EventBus, Listener, Topic};
pub use stats::StoreStats;
pub use transient::TransientStore;
