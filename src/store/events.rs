//! Expiration events.
//!
//! Listeners registered with [`EventBus::on`] run synchronously, in
//! registration order, once per expiration. Async consumers can take a
//! broadcast receiver instead; a receiver that lags behind misses events.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use super::ExpiredBundle;

/// Receivers falling further behind than this lose events.
const CHANNEL_CAPACITY: usize = 256;

// == Topic ==
/// Event topics published by the transient store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A bundle reached its expiration time and was removed
    Expired,
}

impl Topic {
    pub const fn as_str(self) -> &'static str {
        match self {
            Topic::Expired => "expired",
        }
    }
}

/// Callback invoked with each expired bundle.
pub type Listener = Arc<dyn Fn(&ExpiredBundle) + Send + Sync>;

// == Event Bus ==
pub struct EventBus {
    listeners: RwLock<Vec<(Topic, Listener)>>,
    sender: broadcast::Sender<ExpiredBundle>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            listeners: RwLock::new(Vec::new()),
            sender,
        }
    }

    /// Registers a listener for `topic`.
    pub fn on<F>(&self, topic: Topic, listener: F)
    where
        F: Fn(&ExpiredBundle) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((topic, Arc::new(listener)));
    }

    /// Returns a receiver for every expiration published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ExpiredBundle> {
        self.sender.subscribe()
    }

    /// Number of registered listeners for `topic`.
    pub fn listener_count(&self, topic: Topic) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(registered, _)| *registered == topic)
            .count()
    }

    /// Delivers `expired` to every listener of `Topic::Expired`.
    pub fn emit_expired(&self, expired: &ExpiredBundle) {
        // Snapshot so listeners may register further listeners.
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(topic, _)| *topic == Topic::Expired)
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(expired);
        }

        // No receivers is not an error.
        let _ = self.sender.send(expired.clone());
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count(Topic::Expired))
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn expired(key: &str) -> ExpiredBundle {
        ExpiredBundle {
            primary_key: key.to_string(),
            expires: 1,
            payload: json!({"key": key}),
        }
    }

    #[test]
    fn test_topic_name() {
        assert_eq!(Topic::Expired.as_str(), "expired");
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let bus = EventBus::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let calls = Arc::clone(&calls);
            bus.on(Topic::Expired, move |bundle| {
                calls.lock().unwrap().push((id, bundle.primary_key.clone()));
            });
        }

        bus.emit_expired(&expired("a"));

        let calls = calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![(0, "a".to_string()), (1, "a".to_string()), (2, "a".to_string())]
        );
    }

    #[test]
    fn test_emit_without_listeners() {
        let bus = EventBus::new();
        bus.emit_expired(&expired("nobody-listens"));
        assert_eq!(bus.listener_count(Topic::Expired), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit_expired(&expired("b"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.primary_key, "b");
        assert_eq!(received.payload, json!({"key": "b"}));
    }
}
