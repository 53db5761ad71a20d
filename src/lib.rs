//! Transient Store - CRUD storage engines with an expiring cache on top
//!
//! Provides a uniform CRUD contract over file, key-value and in-memory
//! backends, and a TTL cache that persists through any of them and publishes
//! an event when an entry expires.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use engine::{CrudEngine, FileEngine, KeyValueArea, KeyValueEngine, MemoryEngine};
pub use error::{Result, StoreError};
pub use store::{Bundle, ExpiredBundle, Topic, TransientStore};
