//! Trailing-edge debouncing on the tokio timer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::lock;

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

struct Shared<T> {
    generation: AtomicU64,
    output: watch::Sender<Option<T>>,
}

/// Propagates the last pushed value once no new value has arrived for `delay`.
///
/// Every push restarts the timer. Settled values are published on a watch
/// channel and, if configured, handed to a callback. Dropping the debouncer
/// (or calling [`cancel`](Self::cancel)) discards the pending value.
///
/// `push` spawns onto the current tokio runtime and must be called from
/// within one.
pub struct Debouncer<T> {
    delay: Duration,
    shared: Arc<Shared<T>>,
    callback: Option<Callback<T>>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<T> Debouncer<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a debouncer with the given quiet window.
    pub fn new(delay: Duration) -> Self {
        let (output, _) = watch::channel(None);
        Self {
            delay,
            shared: Arc::new(Shared {
                generation: AtomicU64::new(0),
                output,
            }),
            callback: None,
            pending: Mutex::new(None),
        }
    }

    /// Invoke `callback` with every settled value.
    pub fn with_callback(mut self, callback: impl Fn(T) + Send + Sync + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// The quiet window.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Offer a new value, restarting the quiet window.
    pub fn push(&self, value: T) {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let shared = Arc::clone(&self.shared);
        let callback = self.callback.clone();
        let delay = self.delay;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if shared.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            tracing::trace!(delay_ms = delay.as_millis() as u64, "debounced value settled");
            shared.output.send_replace(Some(value.clone()));
            if let Some(callback) = callback {
                callback(value);
            }
        });

        if let Some(previous) = lock(&self.pending).replace(handle) {
            previous.abort();
        }
    }

    /// Drop the pending value, if any, without propagating it.
    pub fn cancel(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(pending) = lock(&self.pending).take() {
            pending.abort();
        }
    }

    /// Whether a value is waiting for its quiet window to elapse.
    pub fn is_pending(&self) -> bool {
        lock(&self.pending)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// The most recently settled value.
    pub fn latest(&self) -> Option<T> {
        self.shared.output.borrow().clone()
    }

    /// Watch settled values.
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.shared.output.subscribe()
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(pending) = lock(&self.pending).take() {
            pending.abort();
        }
    }
}

impl<T> std::fmt::Debug for Debouncer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(String) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v: String| lock(&sink).push(v))
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_last_value_propagates() {
        let (seen, sink) = recorder();
        let debouncer = Debouncer::new(Duration::from_millis(300)).with_callback(sink);

        debouncer.push("m".to_string());
        sleep(Duration::from_millis(100)).await;
        debouncer.push("ma".to_string());
        sleep(Duration::from_millis(100)).await;
        debouncer.push("mal".to_string());

        sleep(Duration::from_millis(299)).await;
        assert!(debouncer.latest().is_none());
        assert!(debouncer.is_pending());

        sleep(Duration::from_millis(2)).await;
        assert_eq!(debouncer.latest().as_deref(), Some("mal"));
        assert_eq!(*lock(&seen), vec!["mal".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_discards_pending_value() {
        let (seen, sink) = recorder();
        let debouncer = Debouncer::new(Duration::from_millis(300)).with_callback(sink);

        debouncer.push("male".to_string());
        debouncer.cancel();
        sleep(Duration::from_millis(500)).await;

        assert!(lock(&seen).is_empty());
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_discards_pending_value() {
        let (seen, sink) = recorder();
        let debouncer = Debouncer::new(Duration::from_millis(300)).with_callback(sink);
        let mut updates = debouncer.subscribe();

        debouncer.push("male".to_string());
        drop(debouncer);
        sleep(Duration::from_millis(500)).await;

        assert!(lock(&seen).is_empty());
        assert!(!updates.has_changed().unwrap_or(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_receives_settled_value() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let mut updates = debouncer.subscribe();

        debouncer.push(7_u32);
        updates.changed().await.unwrap();
        assert_eq!(*updates.borrow(), Some(7));
    }
}
