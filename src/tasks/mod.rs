//! Background Tasks Module
//!
//! # Tasks
//! - Expiration timer: one per live cache entry, removes it when its TTL elapses

mod expiration;

pub use expiration::spawn_expiration_timer;
