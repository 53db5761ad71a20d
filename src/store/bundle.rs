//! Bundle Module
//!
//! Defines the durable bundle, its live cache decoration and the snapshot
//! handed to expiration listeners.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::error::Result;

// == Bundle ==
/// A payload together with its absolute expiration time.
///
/// This is the only shape that reaches the storage engine.
///
/// `expires` is wall-clock time, while expiration timers sleep on the tokio
/// clock. The two agree only while the wall clock moves steadily; under
/// paused tokio time or a wall-clock jump, warm-load decisions and the
/// moment a timer fires can differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Expiration timestamp (Unix milliseconds)
    pub expires: u64,
    /// Caller supplied value, never interpreted by the store
    pub payload: Value,
}

impl Bundle {
    // == Constructor ==
    /// Creates a bundle expiring `ttl` from now.
    pub fn new(payload: Value, ttl: Duration) -> Self {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        Self {
            expires: current_timestamp_ms().saturating_add(ttl_ms),
            payload,
        }
    }

    // == Is Expired ==
    /// Checks if the bundle has expired.
    ///
    /// A bundle is expired once the current time reaches `expires`.
    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() >= self.expires
    }

    // == Time To Live ==
    /// Returns the time left before expiration, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        Duration::from_millis(self.expires.saturating_sub(current_timestamp_ms()))
    }

    /// Decodes a record read from a storage engine.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Encodes the bundle for a storage engine.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

// == Cached Bundle ==
/// A bundle held in the in-memory cache together with its expiration timer.
///
/// The timer handle is process-local and never persisted. Dropping a cached
/// bundle aborts its timer.
#[derive(Debug)]
pub struct CachedBundle {
    bundle: Bundle,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl CachedBundle {
    pub fn new(bundle: Bundle, generation: u64) -> Self {
        Self {
            bundle,
            generation,
            timer: None,
        }
    }

    /// Durable view of this entry.
    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    /// Identifies which timer owns this entry.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns true while an expiration timer is attached.
    pub fn is_armed(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    /// Attaches the expiration timer, aborting any previous one.
    pub fn arm(&mut self, timer: JoinHandle<()>) {
        if let Some(previous) = self.timer.replace(timer) {
            previous.abort();
        }
    }

    /// Detaches the timer without aborting it.
    ///
    /// Used by the timer task itself while it removes the entry.
    pub fn release_timer(&mut self) -> Option<JoinHandle<()>> {
        self.timer.take()
    }
}

impl Drop for CachedBundle {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

// == Expired Bundle ==
/// Snapshot published when a bundle expires.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpiredBundle {
    /// Primary key the bundle was stored under
    pub primary_key: String,
    /// Expiration timestamp (Unix milliseconds)
    pub expires: u64,
    /// The payload that expired
    pub payload: Value,
}

impl ExpiredBundle {
    pub fn new(primary_key: impl Into<String>, bundle: Bundle) -> Self {
        Self {
            primary_key: primary_key.into(),
            expires: bundle.expires,
            payload: bundle.payload,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bundle_expires_after_ttl() {
        let before = current_timestamp_ms();
        let bundle = Bundle::new(json!({"token": "abc"}), Duration::from_secs(60));

        assert!(bundle.expires >= before + 60_000);
        assert!(!bundle.is_expired());
    }

    #[test]
    fn test_ttl_remaining() {
        let bundle = Bundle::new(json!(null), Duration::from_secs(10));

        let remaining = bundle.ttl_remaining();
        assert!(remaining <= Duration::from_secs(10));
        assert!(remaining >= Duration::from_secs(9));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let bundle = Bundle {
            expires: current_timestamp_ms(),
            payload: json!("test"),
        };

        assert!(bundle.is_expired(), "Bundle should be expired at boundary");
        assert_eq!(bundle.ttl_remaining(), Duration::ZERO);
    }

    #[test]
    fn test_durable_shape() {
        let bundle = Bundle {
            expires: 42,
            payload: json!({"token": "123"}),
        };

        let value = bundle.to_value().unwrap();
        assert_eq!(value, json!({"expires": 42, "payload": {"token": "123"}}));
        assert_eq!(Bundle::from_value(value).unwrap(), bundle);
    }

    #[test]
    fn test_from_value_rejects_other_shapes() {
        assert!(Bundle::from_value(json!({"payload": 1})).is_err());
        assert!(Bundle::from_value(json!("raw text")).is_err());
    }

    #[tokio::test]
    async fn test_dropping_cached_bundle_aborts_timer() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let timer = tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await
        });
        let mut cached = CachedBundle::new(Bundle::new(json!(1), Duration::from_secs(1)), 0);
        cached.arm(timer);
        assert!(cached.is_armed());

        drop(cached);
        assert!(rx.await.is_err(), "aborted timer drops its state");
    }

    #[tokio::test]
    async fn test_release_timer_leaves_task_running() {
        let mut cached = CachedBundle::new(Bundle::new(json!(1), Duration::from_secs(1)), 0);
        cached.arm(tokio::spawn(async {}));

        let timer = cached.release_timer().unwrap();
        assert!(!cached.is_armed());
        drop(cached);
        assert!(timer.await.is_ok());
    }
}
