//! Stale-while-revalidate cache store.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use voyage_data::FetchError;
use voyage_observability::{Counter, SyncMetrics};

use crate::dedupe::lock;
use crate::events::ListenerRegistry;
use crate::{
    CacheEntry, CacheEvent, FetchStatus, Pending, QueryKey, QueryResult, RequestDeduplicator,
    StalenessPolicy, Subscription, SyncError,
};

#[derive(Debug, Clone)]
struct Slot {
    entry: CacheEntry,
    /// Configured freshness window, restored when new data lands.
    window: Duration,
    /// Bumped by every local change and every settled fetch. A fetch that
    /// settles under a different epoch than it started with must not
    /// replace newer data.
    epoch: u64,
}

impl Slot {
    fn new(key: QueryKey, window: Duration) -> Self {
        Self {
            entry: CacheEntry::new(key, window),
            window,
            epoch: 0,
        }
    }
}

enum Lookup {
    Fresh(Value),
    Stale(Value),
    Missing,
}

struct Inner {
    entries: Mutex<HashMap<QueryKey, Slot>>,
    dedupe: RequestDeduplicator<Value>,
    listeners: Arc<ListenerRegistry>,
    policy: StalenessPolicy,
    metrics: Arc<SyncMetrics>,
}

/// Point-in-time copy of every entry under a prefix.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    prefix: QueryKey,
    slots: Vec<(QueryKey, Slot)>,
    /// Epoch each key held right after the owning change was applied.
    applied: HashMap<QueryKey, u64>,
}

impl Snapshot {
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Process-wide cache of remote reads.
///
/// Cloning is cheap and shares the same entries. Reads never block on the
/// network; only [`ensure`](Self::ensure) on an absent entry waits for a
/// fetch.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<Inner>,
}

impl CacheStore {
    pub fn new(policy: StalenessPolicy) -> Self {
        Self::with_metrics(policy, Arc::new(SyncMetrics::new()))
    }

    /// Create a store that records into shared metrics.
    pub fn with_metrics(policy: StalenessPolicy, metrics: Arc<SyncMetrics>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                dedupe: RequestDeduplicator::new(Arc::clone(&metrics)),
                listeners: Arc::new(ListenerRegistry::default()),
                policy,
                metrics,
            }),
        }
    }

    pub fn policy(&self) -> &StalenessPolicy {
        &self.inner.policy
    }

    pub fn metrics(&self) -> &Arc<SyncMetrics> {
        &self.inner.metrics
    }

    /// Copy of the entry for `key`. Never fetches.
    pub fn read(&self, key: &QueryKey) -> Option<CacheEntry> {
        lock(&self.inner.entries).get(key).map(|slot| slot.entry.clone())
    }

    /// Binding view of the entry for `key`. Never fetches.
    pub fn result(&self, key: &QueryKey) -> QueryResult {
        QueryResult::from_entry(self.read(key).as_ref())
    }

    /// Every cached key, sorted.
    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = lock(&self.inner.entries).keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a fetch for `key` is in flight.
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.inner.dedupe.is_in_flight(key)
    }

    /// Return data for `key`, fetching only when needed.
    ///
    /// Fresh data is returned as is. Stale data is returned immediately and
    /// refreshed in the background. Without data the caller waits for the
    /// (deduplicated) fetch.
    pub async fn ensure<F, Fut>(
        &self,
        key: &QueryKey,
        fetch: F,
        stale_after: Duration,
    ) -> Result<Value, SyncError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
    {
        match self.lookup(key) {
            Lookup::Fresh(data) => {
                self.inner.metrics.record(Counter::Hit);
                tracing::debug!(key = %key, status = "hit", "cache read");
                Ok(data)
            }
            Lookup::Stale(data) => {
                self.inner.metrics.record(Counter::StaleHit);
                tracing::debug!(key = %key, status = "stale", "cache read; refreshing in background");
                if !self.inner.dedupe.is_in_flight(key) {
                    self.inner.metrics.record(Counter::BackgroundRefresh);
                }
                drop(self.start_fetch(key, fetch, stale_after));
                Ok(data)
            }
            Lookup::Missing => {
                self.inner.metrics.record(Counter::Miss);
                tracing::debug!(key = %key, status = "miss", "cache read");
                self.start_fetch(key, fetch, stale_after)
                    .await
                    .map_err(SyncError::Fetch)
            }
        }
    }

    /// [`ensure`](Self::ensure) with the policy window for `key`.
    pub async fn ensure_with_policy<F, Fut>(&self, key: &QueryKey, fetch: F) -> Result<Value, SyncError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
    {
        let stale_after = self.inner.policy.for_key(key);
        self.ensure(key, fetch, stale_after).await
    }

    /// Populate `key` unless it is already fresh.
    ///
    /// Unlike [`ensure`](Self::ensure) a stale entry is refreshed before
    /// returning.
    pub async fn prefetch<F, Fut>(&self, key: &QueryKey, fetch: F) -> Result<(), SyncError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
    {
        if let Lookup::Fresh(_) = self.lookup(key) {
            return Ok(());
        }
        let stale_after = self.inner.policy.for_key(key);
        self.start_fetch(key, fetch, stale_after)
            .await
            .map(|_| ())
            .map_err(SyncError::Fetch)
    }

    /// Overwrite the data for `key` and mark it fresh.
    pub fn write(&self, key: &QueryKey, data: Value) {
        {
            let mut entries = lock(&self.inner.entries);
            let slot = entries
                .entry(key.clone())
                .or_insert_with(|| Slot::new(key.clone(), self.inner.policy.for_key(key)));
            slot.entry.data = Some(data);
            slot.entry.fetched_at = Some(Instant::now());
            slot.entry.stale_after = slot.window;
            slot.entry.error = None;
            if slot.entry.status != FetchStatus::Fetching {
                slot.entry.status = FetchStatus::Success;
            }
            slot.epoch += 1;
        }
        tracing::debug!(key = %key, "cache write");
        self.inner
            .listeners
            .notify(&[CacheEvent::Updated { key: key.clone() }]);
    }

    /// Mark every entry under `prefix` stale, keeping its data.
    ///
    /// Returns how many entries became stale; entries that were already
    /// invalidated are not counted again.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut events = Vec::new();
        {
            let mut entries = lock(&self.inner.entries);
            for (key, slot) in entries.iter_mut() {
                if !prefix.is_prefix_of(key) {
                    continue;
                }
                // Any fetch already in flight predates this invalidation.
                slot.epoch += 1;
                if !slot.entry.stale_after.is_zero() {
                    slot.entry.stale_after = Duration::ZERO;
                    events.push(CacheEvent::Invalidated { key: key.clone() });
                }
            }
        }
        let changed = events.len();
        if changed > 0 {
            self.inner.metrics.add(Counter::Invalidation, changed as u64);
            tracing::debug!(prefix = %prefix, entries = changed, "invalidated");
        }
        self.inner.listeners.notify(&events);
        changed
    }

    /// Register a listener for changes under `prefix`.
    pub fn subscribe(
        &self,
        prefix: QueryKey,
        listener: impl Fn(&CacheEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.listeners.subscribe(prefix, Arc::new(listener))
    }

    /// Copy every entry under `prefix`.
    pub(crate) fn snapshot(&self, prefix: &QueryKey) -> Snapshot {
        let slots = lock(&self.inner.entries)
            .iter()
            .filter(|(key, _)| prefix.is_prefix_of(key))
            .map(|(key, slot)| (key.clone(), slot.clone()))
            .collect();
        Snapshot {
            prefix: prefix.clone(),
            slots,
            applied: HashMap::new(),
        }
    }

    /// Replace data under the snapshot's prefix with `updater`'s output where
    /// it returns `Some`. Freshness is left alone.
    pub(crate) fn apply_optimistic(
        &self,
        snapshot: &mut Snapshot,
        updater: &dyn Fn(&Value) -> Option<Value>,
    ) -> usize {
        let mut events = Vec::new();
        {
            let mut entries = lock(&self.inner.entries);
            for (key, slot) in entries.iter_mut() {
                if !snapshot.prefix.is_prefix_of(key) {
                    continue;
                }
                let Some(updated) = slot.entry.data.as_ref().and_then(updater) else {
                    continue;
                };
                slot.entry.data = Some(updated);
                slot.epoch += 1;
                snapshot.applied.insert(key.clone(), slot.epoch);
                events.push(CacheEvent::Updated { key: key.clone() });
            }
        }
        let changed = events.len();
        self.inner.metrics.add(Counter::OptimisticApplied, changed as u64);
        self.inner.listeners.notify(&events);
        changed
    }

    /// Put every entry in `snapshot` back as it was.
    ///
    /// An entry whose epoch moved after the owning change was applied gets
    /// its old data back but stays invalidated, so the next read refetches
    /// instead of serving the restored data as fresh.
    pub(crate) fn restore(&self, snapshot: Snapshot) -> usize {
        let mut events = Vec::with_capacity(snapshot.slots.len());
        {
            let mut entries = lock(&self.inner.entries);
            for (key, saved) in snapshot.slots {
                let expected = snapshot.applied.get(&key).copied().unwrap_or(saved.epoch);
                let live = entries.get(&key).map(|slot| (slot.epoch, slot.entry.status));
                let mut restored = saved;
                if let Some((epoch, status)) = live {
                    restored.epoch = epoch + 1;
                    if epoch != expected {
                        restored.entry.stale_after = Duration::ZERO;
                    }
                    // A fetch started after the snapshot is still in flight.
                    if status == FetchStatus::Fetching {
                        restored.entry.status = FetchStatus::Fetching;
                    }
                } else {
                    restored.epoch += 1;
                }
                entries.insert(key.clone(), restored);
                events.push(CacheEvent::Updated { key });
            }
        }
        tracing::debug!(prefix = %snapshot.prefix, entries = events.len(), "restored snapshot");
        let restored = events.len();
        self.inner.listeners.notify(&events);
        restored
    }

    fn lookup(&self, key: &QueryKey) -> Lookup {
        let now = Instant::now();
        match lock(&self.inner.entries).get(key) {
            Some(slot) => match &slot.entry.data {
                Some(data) if slot.entry.is_fresh_at(now) => Lookup::Fresh(data.clone()),
                Some(data) => Lookup::Stale(data.clone()),
                None => Lookup::Missing,
            },
            None => Lookup::Missing,
        }
    }

    /// Join or start the fetch for `key`. Settlement is written into the
    /// store exactly once, by the shared request itself.
    fn start_fetch<F, Fut>(&self, key: &QueryKey, fetch: F, stale_after: Duration) -> Pending<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
    {
        let store = self.clone();
        let owned = key.clone();
        let listeners = Arc::clone(&self.inner.listeners);
        self.inner.dedupe.join_then(
            key,
            move || {
                let epoch = store.mark_fetching(&owned, stale_after);
                let request = fetch();
                async move {
                    let started = Instant::now();
                    let result = request.await;
                    let event = store.settle(&owned, epoch, &result, started);
                    (result, event)
                }
            },
            // Listeners run after the in-flight record is gone, so a
            // refetch they trigger starts a new request.
            move |event: Option<CacheEvent>| {
                if let Some(event) = event {
                    listeners.notify(&[event]);
                }
            },
        )
    }

    fn mark_fetching(&self, key: &QueryKey, stale_after: Duration) -> u64 {
        let mut entries = lock(&self.inner.entries);
        let slot = entries
            .entry(key.clone())
            .or_insert_with(|| Slot::new(key.clone(), stale_after));
        slot.window = stale_after;
        if !slot.entry.stale_after.is_zero() {
            slot.entry.stale_after = stale_after;
        }
        slot.entry.status = FetchStatus::Fetching;
        slot.epoch
    }

    /// Write a finished fetch into its entry and return the event to publish.
    fn settle(
        &self,
        key: &QueryKey,
        epoch: u64,
        result: &Result<Value, FetchError>,
        started: Instant,
    ) -> Option<CacheEvent> {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let mut entries = lock(&self.inner.entries);
        let slot = entries
            .entry(key.clone())
            .or_insert_with(|| Slot::new(key.clone(), self.inner.policy.for_key(key)));

        match result {
            Ok(value) if slot.epoch == epoch => {
                slot.entry.data = Some(value.clone());
                slot.entry.fetched_at = Some(Instant::now());
                slot.entry.stale_after = slot.window;
                slot.entry.status = FetchStatus::Success;
                slot.entry.error = None;
                slot.epoch += 1;
                tracing::debug!(key = %key, status = "success", elapsed_ms, "fetch settled");
                Some(CacheEvent::Updated { key: key.clone() })
            }
            Ok(value) => {
                // The entry changed locally while the fetch was in flight.
                slot.entry.status = FetchStatus::Success;
                slot.entry.error = None;
                tracing::debug!(key = %key, status = "superseded", elapsed_ms, "fetch settled");
                if slot.entry.data.is_none() {
                    slot.entry.data = Some(value.clone());
                    slot.entry.fetched_at = Some(Instant::now());
                    Some(CacheEvent::Updated { key: key.clone() })
                } else {
                    None
                }
            }
            Err(error) => {
                let error = Arc::new(error.clone());
                slot.entry.status = FetchStatus::Error;
                slot.entry.error = Some(Arc::clone(&error));
                self.inner.metrics.record(Counter::FetchFailure);
                tracing::warn!(key = %key, status = "error", elapsed_ms, error = %error, "fetch failed");
                Some(CacheEvent::Failed {
                    key: key.clone(),
                    error,
                })
            }
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(StalenessPolicy::default())
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.len())
            .field("in_flight", &self.inner.dedupe.in_flight_count())
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::{advance, sleep};
    use voyage_data::Domain;

    const TTL: Duration = Duration::from_millis(300_000);

    /// A fetch function answering `{"v": n}` on its nth call.
    fn counting_fetch(
        calls: &Arc<AtomicU32>,
        delay: Duration,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<Value, FetchError>> {
        let calls = Arc::clone(calls);
        move || {
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                Ok::<Value, FetchError>(json!({ "v": n }))
            }
            .boxed()
        }
    }

    fn failing_fetch(
        calls: &Arc<AtomicU32>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<Value, FetchError>> {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<Value, FetchError>(FetchError::http(503, "unavailable"))
            }
            .boxed()
        }
    }

    fn list_key() -> QueryKey {
        keys::list::<Value>(Domain::Properties, None).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_ensures_within_window_make_one_call() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicU32::new(0));

        let first = store.ensure(&list_key(), counting_fetch(&calls, Duration::ZERO), TTL).await;
        advance(Duration::from_millis(299_000)).await;
        let second = store.ensure(&list_key(), counting_fetch(&calls, Duration::ZERO), TTL).await;

        assert_eq!(first.unwrap(), json!({"v": 1}));
        assert_eq!(second.unwrap(), json!({"v": 1}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.metrics().get(Counter::NetworkCall), 1);
        assert_eq!(store.metrics().get(Counter::Hit), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_ensures_share_one_value() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicU32::new(0));
        let key = list_key();
        let delay = Duration::from_millis(50);

        let (a, b, c) = tokio::join!(
            store.ensure(&key, counting_fetch(&calls, delay), TTL),
            store.ensure(&key, counting_fetch(&calls, delay), TTL),
            store.ensure(&key, counting_fetch(&calls, delay), TTL),
        );

        assert_eq!(a.unwrap(), json!({"v": 1}));
        assert_eq!(b.unwrap(), json!({"v": 1}));
        assert_eq!(c.unwrap(), json!({"v": 1}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.metrics().get(Counter::DedupJoin), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_is_loading_until_settled() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicU32::new(0));
        let key = list_key();

        let background = store.clone();
        let fetch = counting_fetch(&calls, Duration::from_millis(100));
        let task_key = key.clone();
        let handle = tokio::spawn(async move { background.ensure(&task_key, fetch, TTL).await });

        sleep(Duration::from_millis(10)).await;
        assert!(store.result(&key).is_loading);
        assert_eq!(store.read(&key).unwrap().status, FetchStatus::Fetching);

        handle.await.unwrap().unwrap();
        let result = store.result(&key);
        assert!(!result.is_loading);
        assert_eq!(result.data, Some(json!({"v": 1})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_then_read_is_fresh() {
        let store = CacheStore::default();
        let key = keys::detail(Domain::Properties, 42);

        store.write(&key, json!({"id": 42}));
        let entry = store.read(&key).unwrap();
        assert_eq!(entry.data, Some(json!({"id": 42})));
        assert_eq!(entry.fetched_at, Some(Instant::now()));
        assert!(entry.is_fresh());
        assert_eq!(entry.status, FetchStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_after_invalidate_is_fresh_again() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicU32::new(0));
        let key = list_key();

        store.ensure(&key, counting_fetch(&calls, Duration::ZERO), TTL).await.unwrap();
        store.invalidate(&keys::all(Domain::Properties));
        assert!(!store.read(&key).unwrap().is_fresh());

        store.write(&key, json!([]));
        let entry = store.read(&key).unwrap();
        assert!(entry.is_fresh());
        assert_eq!(entry.stale_after, TTL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_is_idempotent() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicU32::new(0));
        let key = list_key();
        store.ensure(&key, counting_fetch(&calls, Duration::ZERO), TTL).await.unwrap();

        assert_eq!(store.invalidate(&keys::all(Domain::Properties)), 1);
        let once = store.read(&key).unwrap();
        assert_eq!(store.invalidate(&keys::all(Domain::Properties)), 0);
        let twice = store.read(&key).unwrap();

        assert_eq!(once.data, twice.data);
        assert_eq!(once.fetched_at, twice.fetched_at);
        assert_eq!(once.stale_after, Duration::ZERO);
        assert_eq!(twice.stale_after, Duration::ZERO);
        assert_eq!(once.status, twice.status);
        assert_eq!(store.metrics().get(Counter::Invalidation), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidated_entry_refetches_and_serves_old_value_meanwhile() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicU32::new(0));
        let key = keys::detail(Domain::Properties, 42);

        store.ensure(&key, counting_fetch(&calls, Duration::ZERO), TTL).await.unwrap();
        store.invalidate(&key);

        let served = store
            .ensure(&key, counting_fetch(&calls, Duration::from_millis(20)), TTL)
            .await
            .unwrap();
        assert_eq!(served, json!({"v": 1}));

        sleep(Duration::from_millis(30)).await;
        let entry = store.read(&key).unwrap();
        assert_eq!(entry.data, Some(json!({"v": 2})));
        assert!(entry.is_fresh());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_while_revalidate() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicU32::new(0));
        let key = list_key();
        assert_eq!(key.to_string(), "properties:list:{}");

        let v1 = store.ensure(&key, counting_fetch(&calls, Duration::ZERO), TTL).await.unwrap();
        assert_eq!(v1, json!({"v": 1}));

        advance(Duration::from_millis(400_000)).await;
        let served = store
            .ensure(&key, counting_fetch(&calls, Duration::from_millis(5)), TTL)
            .await
            .unwrap();
        assert_eq!(served, json!({"v": 1}));
        assert!(store.is_fetching(&key));

        sleep(Duration::from_millis(10)).await;
        assert_eq!(store.read(&key).unwrap().data, Some(json!({"v": 2})));
        assert_eq!(store.metrics().get(Counter::StaleHit), 1);
        assert_eq!(store.metrics().get(Counter::BackgroundRefresh), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_failure_keeps_data() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicU32::new(0));
        let key = list_key();

        store.ensure(&key, counting_fetch(&calls, Duration::ZERO), TTL).await.unwrap();
        store.invalidate(&key);
        let served = store.ensure(&key, failing_fetch(&calls), TTL).await.unwrap();
        assert_eq!(served, json!({"v": 1}));

        sleep(Duration::from_millis(1)).await;
        let entry = store.read(&key).unwrap();
        assert_eq!(entry.status, FetchStatus::Error);
        assert_eq!(entry.data, Some(json!({"v": 1})));
        let result = store.result(&key);
        assert!(result.is_error);
        assert!(!result.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_failure_surfaces_and_next_call_retries() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicU32::new(0));
        let key = keys::amenities();

        let err = store.ensure(&key, failing_fetch(&calls), TTL).await.unwrap_err();
        assert_eq!(err.fetch_error().and_then(FetchError::status), Some(503));
        assert_eq!(store.read(&key).unwrap().status, FetchStatus::Error);
        assert!(!store.is_fetching(&key));

        let value = store.ensure(&key, counting_fetch(&calls, Duration::ZERO), TTL).await.unwrap();
        assert_eq!(value, json!({"v": 2}));
        assert_eq!(store.read(&key).unwrap().status, FetchStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_fetch_does_not_overwrite_newer_write() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicU32::new(0));
        let key = keys::detail(Domain::Properties, 42);

        let background = store.clone();
        let fetch = counting_fetch(&calls, Duration::from_millis(100));
        let task_key = key.clone();
        let handle = tokio::spawn(async move { background.ensure(&task_key, fetch, TTL).await });

        sleep(Duration::from_millis(10)).await;
        store.write(&key, json!({"id": 42, "is_favorite": true}));
        handle.await.unwrap().unwrap();

        let entry = store.read(&key).unwrap();
        assert_eq!(entry.data, Some(json!({"id": 42, "is_favorite": true})));
        assert_eq!(entry.status, FetchStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_predating_invalidation_leaves_entry_stale() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicU32::new(0));
        let key = list_key();

        store.ensure(&key, counting_fetch(&calls, Duration::ZERO), TTL).await.unwrap();
        advance(TTL).await;
        store.ensure(&key, counting_fetch(&calls, Duration::from_millis(50)), TTL).await.unwrap();
        store.invalidate(&key);

        sleep(Duration::from_millis(60)).await;
        let entry = store.read(&key).unwrap();
        assert_eq!(entry.data, Some(json!({"v": 1})));
        assert!(!entry.is_fresh());
        assert_eq!(entry.status, FetchStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prefetch_is_noop_when_fresh() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicU32::new(0));
        let key = keys::detail(Domain::Packages, 7);

        store.prefetch(&key, counting_fetch(&calls, Duration::ZERO)).await.unwrap();
        store.prefetch(&key, counting_fetch(&calls, Duration::ZERO)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.read(&key).unwrap().stale_after, store.policy().for_key(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listeners_see_updates_and_invalidations() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let subscription = store.subscribe(keys::all(Domain::Properties), move |event| {
            let label = match event {
                CacheEvent::Updated { .. } => "updated",
                CacheEvent::Invalidated { .. } => "invalidated",
                CacheEvent::Failed { .. } => "failed",
            };
            lock(&sink).push(format!("{}:{}", label, event.key()));
        });

        store.ensure(&list_key(), counting_fetch(&calls, Duration::ZERO), TTL).await.unwrap();
        store.write(&keys::amenities(), json!([]));
        store.invalidate(&keys::all(Domain::Properties));
        drop(subscription);
        store.write(&list_key(), json!([]));

        assert_eq!(
            *lock(&seen),
            vec![
                "updated:properties:list:{}".to_string(),
                "invalidated:properties:list:{}".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_listeners_run_after_fetch_leaves_flight() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let observer = store.clone();
        let sink = Arc::clone(&seen);
        let _subscription = store.subscribe(list_key(), move |event| {
            lock(&sink).push(observer.is_fetching(event.key()));
        });

        store.ensure(&list_key(), counting_fetch(&calls, Duration::from_millis(5)), TTL).await.unwrap();
        store.invalidate(&list_key());
        store.prefetch(&list_key(), failing_fetch(&calls)).await.unwrap_err();

        // updated, invalidated, failed: none of them still in flight.
        assert_eq!(*lock(&seen), vec![false, false, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_over_invalidated_entry_stays_stale() {
        let store = CacheStore::default();
        let key = keys::detail(Domain::Properties, 42);
        store.write(&key, json!({"id": 42, "is_favorite": false}));

        let mut snapshot = store.snapshot(&keys::all(Domain::Properties));
        store.apply_optimistic(&mut snapshot, &|_: &Value| Some(json!({"id": 42, "is_favorite": true})));
        store.invalidate(&key);
        store.restore(snapshot);

        let entry = store.read(&key).unwrap();
        assert_eq!(entry.data, Some(json!({"id": 42, "is_favorite": false})));
        assert!(entry.is_invalidated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_restore_is_exact() {
        let store = CacheStore::default();
        let key = keys::detail(Domain::Properties, 42);
        store.write(&key, json!({"id": 42, "is_favorite": false}));
        let before = store.read(&key).unwrap();

        let mut snapshot = store.snapshot(&keys::all(Domain::Properties));
        assert_eq!(snapshot.len(), 1);
        let changed = store.apply_optimistic(&mut snapshot, &|_: &Value| {
            Some(json!({"id": 42, "is_favorite": true}))
        });
        assert_eq!(changed, 1);

        advance(Duration::from_millis(5)).await;
        store.restore(snapshot);
        let after = store.read(&key).unwrap();
        assert_eq!(after.data, before.data);
        assert_eq!(after.fetched_at, before.fetched_at);
        assert_eq!(after.stale_after, before.stale_after);
        assert_eq!(after.status, before.status);
    }
}
