//! Single-flight request deduplication.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use voyage_data::FetchError;
use voyage_observability::{Counter, SyncMetrics};

use crate::QueryKey;

/// Result shared by every caller of one in-flight request.
pub type Pending<T = Value> = Shared<BoxFuture<'static, Result<T, Arc<FetchError>>>>;

struct InFlight<T> {
    id: u64,
    future: Pending<T>,
    subscribers: usize,
}

type Registry<T> = Arc<Mutex<HashMap<QueryKey, InFlight<T>>>>;

/// Collapses concurrent requests for the same key into one.
///
/// The request runs on its own task, so it settles even if every caller
/// stops waiting. Its record is removed before callers see the result: a
/// call made after settlement always starts a fresh request.
pub struct RequestDeduplicator<T = Value> {
    inflight: Registry<T>,
    next_id: AtomicU64,
    metrics: Arc<SyncMetrics>,
}

impl<T> RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(metrics: Arc<SyncMetrics>) -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            metrics,
        }
    }

    /// Run `factory` for `key` unless a request is already in flight, and
    /// wait for the shared result.
    pub async fn dedupe<F, Fut>(&self, key: &QueryKey, factory: F) -> Result<T, Arc<FetchError>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        self.join(key, factory).await
    }

    /// Register interest in `key` without waiting.
    ///
    /// `factory` is only invoked when nothing is in flight for `key`. It is
    /// called while the registry is locked and must not re-enter the
    /// deduplicator. Must be called from within a tokio runtime.
    pub fn join<F, Fut>(&self, key: &QueryKey, factory: F) -> Pending<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        self.join_then(
            key,
            || {
                let request = factory();
                async move { (request.await, ()) }
            },
            |()| {},
        )
    }

    /// Like [`join`](Self::join), but the request also yields a notice that
    /// is handed to `then` once the record is removed and before any caller
    /// sees the result.
    pub fn join_then<F, Fut, N, A>(&self, key: &QueryKey, factory: F, then: A) -> Pending<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = (Result<T, FetchError>, N)> + Send + 'static,
        N: Send + 'static,
        A: FnOnce(N) + Send + 'static,
    {
        let mut inflight = lock(&self.inflight);

        if let Some(record) = inflight.get_mut(key) {
            record.subscribers += 1;
            self.metrics.record(Counter::DedupJoin);
            tracing::debug!(key = %key, subscribers = record.subscribers, "joined in-flight request");
            return record.future.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.metrics.record(Counter::NetworkCall);

        let request = factory();
        let guard = Settle {
            registry: Arc::clone(&self.inflight),
            key: key.clone(),
            id,
        };
        let task = tokio::spawn(async move {
            let (result, notice) = request.await;
            drop(guard);
            then(notice);
            result.map_err(Arc::new)
        });

        let future = async move {
            match task.await {
                Ok(result) => result,
                Err(_) => Err(Arc::new(FetchError::Cancelled)),
            }
        }
        .boxed()
        .shared();

        inflight.insert(
            key.clone(),
            InFlight {
                id,
                future: future.clone(),
                subscribers: 1,
            },
        );
        future
    }

    /// Whether a request for `key` is in flight.
    pub fn is_in_flight(&self, key: &QueryKey) -> bool {
        lock(&self.inflight).contains_key(key)
    }

    /// Callers attached to the in-flight request for `key`.
    pub fn subscribers(&self, key: &QueryKey) -> Option<usize> {
        lock(&self.inflight).get(key).map(|r| r.subscribers)
    }

    /// Number of keys with a request in flight.
    pub fn in_flight_count(&self) -> usize {
        lock(&self.inflight).len()
    }
}

impl<T> std::fmt::Debug for RequestDeduplicator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDeduplicator")
            .field("in_flight", &lock(&self.inflight).len())
            .finish()
    }
}

/// Removes an in-flight record when its request settles, panics or is aborted.
struct Settle<T> {
    registry: Registry<T>,
    key: QueryKey,
    id: u64,
}

impl<T> Drop for Settle<T> {
    fn drop(&mut self) {
        let mut inflight = lock(&self.registry);
        if inflight.get(&self.key).is_some_and(|r| r.id == self.id) {
            inflight.remove(&self.key);
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
