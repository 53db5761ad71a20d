//! Expiration Timer Task
//!
//! Spawns the one-shot task that fires when a cached bundle reaches its
//! expiration time.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// Spawns a task that waits `delay` and then runs `on_expire`.
///
/// The returned handle is the bundle's timer: aborting it before `delay`
/// elapses cancels the expiration.
///
/// # Example
/// ```ignore
/// let timer = spawn_expiration_timer("tokens@abc".to_string(), ttl, async move {
///     store.expire("tokens@abc").await;
/// });
/// // Later, when the entry is deleted explicitly:
/// timer.abort();
/// ```
pub fn spawn_expiration_timer<F>(cache_key: String, delay: Duration, on_expire: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        debug!(cache_key = %cache_key, delay_ms = delay_ms(delay), "expiration timer armed");

        tokio::time::sleep(delay).await;

        debug!(cache_key = %cache_key, "expiration timer fired");
        on_expire.await;
    })
}

fn delay_ms(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let handle = spawn_expiration_timer("t@k".to_string(), Duration::from_secs(60), async move {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::advance(Duration::from_secs(59)).await;
        tokio::task::yield_now().await;
        assert!(!fired.load(Ordering::SeqCst), "Timer should not fire early");

        handle.await.unwrap();
        assert!(fired.load(Ordering::SeqCst), "Timer should fire after delay");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_can_be_aborted() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let handle = spawn_expiration_timer("t@k".to_string(), Duration::from_secs(1), async move {
            flag.store(true, Ordering::SeqCst);
        });

        handle.abort();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(handle.is_finished(), "Task should be finished after abort");
        assert!(!fired.load(Ordering::SeqCst), "Aborted timer must not fire");
    }

    #[test]
    fn test_delay_ms_saturates() {
        assert_eq!(delay_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(delay_ms(Duration::MAX), u64::MAX);
    }
}
