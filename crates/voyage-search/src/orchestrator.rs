//! The search state machine.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use voyage_cache::{CacheStore, QueryKey, SyncError};
use voyage_data::{FetchError, ResourceApi};
use voyage_observability::Counter;
use voyage_timing::Debouncer;

use crate::{SearchConfig, SearchPhase, SearchSession};

type Fetcher = Arc<dyn Fn(String, Value) -> BoxFuture<'static, Result<Value, FetchError>> + Send + Sync>;

/// What a search input renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchSnapshot {
    pub phase: SearchPhase,
    /// Normalized input.
    pub query: String,
    /// Results of the last accepted search; kept while debouncing.
    pub results: Option<Value>,
    pub error: Option<String>,
}

#[derive(Default)]
struct State {
    session: SearchSession,
    snapshot: SearchSnapshot,
}

struct Shared {
    store: CacheStore,
    fetch: Fetcher,
    config: SearchConfig,
    state: Mutex<State>,
    output: watch::Sender<SearchSnapshot>,
}

impl Shared {
    fn publish(&self, state: &State) {
        self.output.send_replace(state.snapshot.clone());
    }

    /// The input has been stable for the debounce window.
    fn on_debounced(self: &Arc<Self>, query: String) {
        let mut state = lock(&self.state);
        if state.session.raw_query != query {
            return;
        }
        state.session.debounced_query = Some(query.clone());

        if !self.config.is_searchable(&query) {
            state.session.last_issued_key = None;
            state.snapshot.phase = SearchPhase::Idle;
            state.snapshot.results = None;
            state.snapshot.error = None;
            self.publish(&state);
            tracing::debug!(query = %query, "query too short; not searching");
            return;
        }

        let key = state.session.key_for(&query);
        let filters = state.session.filters.clone();
        state.session.last_issued_key = Some(key.clone());
        state.snapshot.phase = SearchPhase::Fetching;
        self.publish(&state);
        drop(state);

        tracing::debug!(key = %key, "search issued");
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let fetch = Arc::clone(&shared.fetch);
            let term = query.clone();
            let outcome = shared
                .store
                .ensure_with_policy(&key, move || fetch(term, filters))
                .await;
            shared.settle(&key, &query, outcome);
        });
    }

    /// Accept a settled search unless the input has moved on since it was issued.
    fn settle(&self, key: &QueryKey, query: &str, outcome: Result<Value, SyncError>) {
        let mut state = lock(&self.state);
        let current = state.snapshot.phase == SearchPhase::Fetching
            && state.session.debounced_query.as_deref() == Some(query)
            && state.session.last_issued_key.as_ref() == Some(key);
        if !current {
            self.store.metrics().record(Counter::SuppressedResult);
            tracing::debug!(key = %key, "search result suppressed");
            return;
        }

        match outcome {
            Ok(results) => {
                state.snapshot.phase = if is_empty_result(&results) {
                    SearchPhase::ShowingEmpty
                } else {
                    SearchPhase::ShowingResults
                };
                state.snapshot.results = Some(results);
                state.snapshot.error = None;
            }
            Err(error) => {
                tracing::warn!(key = %key, error = %error, "search failed");
                state.snapshot.phase = SearchPhase::ShowingError;
                state.snapshot.results = None;
                state.snapshot.error = Some(error.to_string());
            }
        }
        self.publish(&state);
    }
}

/// Drives one search input.
///
/// Keystrokes restart a debounce window; once the input is stable and long
/// enough, the search goes through [`CacheStore::ensure`] so repeated and
/// concurrent queries share results. A search that settles after the input
/// has changed (or been cleared) is discarded, never shown.
///
/// Dropping the orchestrator discards any pending keystroke. Methods that
/// change the query must be called from within a tokio runtime.
pub struct SearchOrchestrator {
    shared: Arc<Shared>,
    debouncer: Debouncer<String>,
}

impl SearchOrchestrator {
    /// Search with `fetch(query, filters)` behind the cache.
    pub fn new<F, Fut>(store: CacheStore, config: SearchConfig, fetch: F) -> Self
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
    {
        let fetch: Fetcher = Arc::new(
            move |query: String, filters: Value| -> BoxFuture<'static, Result<Value, FetchError>> {
                fetch(query, filters).boxed()
            },
        );
        let (output, _) = watch::channel(SearchSnapshot::default());
        let delay = config.debounce();
        let shared = Arc::new(Shared {
            store,
            fetch,
            config,
            state: Mutex::new(State::default()),
            output,
        });

        let weak = Arc::downgrade(&shared);
        let debouncer = Debouncer::new(delay).with_callback(move |query: String| {
            if let Some(shared) = weak.upgrade() {
                shared.on_debounced(query);
            }
        });

        Self { shared, debouncer }
    }

    /// Search properties and packages through `api`.
    pub fn for_api(store: CacheStore, api: ResourceApi, config: SearchConfig) -> Self {
        Self::new(store, config, move |query: String, filters: Value| {
            let api = api.clone();
            async move { api.search(&query, &filters).await }
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.shared.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.shared.store
    }

    /// Handle a keystroke. Unchanged input is ignored; blank input clears.
    pub fn set_query(&self, raw: &str) {
        let query = self.shared.config.normalize(raw);
        let mut state = lock(&self.shared.state);
        if state.session.raw_query == query {
            return;
        }
        if query.is_empty() {
            drop(state);
            self.clear();
            return;
        }

        state.session.raw_query = query.clone();
        state.snapshot.query = query.clone();
        state.snapshot.phase = SearchPhase::Debouncing;
        self.shared.publish(&state);
        drop(state);

        self.debouncer.push(query);
    }

    /// Replace the filters, re-running the current query if there is one.
    pub fn set_filters(&self, filters: Value) {
        let mut state = lock(&self.shared.state);
        if state.session.filters == filters {
            return;
        }
        state.session.filters = filters;
        if state.session.raw_query.is_empty() {
            return;
        }

        let query = state.session.raw_query.clone();
        state.snapshot.phase = SearchPhase::Debouncing;
        self.shared.publish(&state);
        drop(state);

        self.debouncer.push(query);
    }

    /// Empty the input.
    pub fn clear(&self) {
        self.debouncer.cancel();
        let mut state = lock(&self.shared.state);
        state.session.reset();
        state.snapshot = SearchSnapshot::default();
        self.shared.publish(&state);
        tracing::debug!("search cleared");
    }

    /// Stop searching but keep the typed text.
    pub fn cancel(&self) {
        self.debouncer.cancel();
        let mut state = lock(&self.shared.state);
        state.session.debounced_query = None;
        state.session.last_issued_key = None;
        state.snapshot.phase = SearchPhase::Idle;
        state.snapshot.results = None;
        state.snapshot.error = None;
        self.shared.publish(&state);
        tracing::debug!("search cancelled");
    }

    /// What the input currently shows.
    pub fn snapshot(&self) -> SearchSnapshot {
        lock(&self.shared.state).snapshot.clone()
    }

    pub fn session(&self) -> SearchSession {
        lock(&self.shared.state).session.clone()
    }

    /// Watch every change to the snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot> {
        self.shared.output.subscribe()
    }
}

impl std::fmt::Debug for SearchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchOrchestrator")
            .field("config", &self.shared.config)
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

/// No records anywhere in a search response.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn is_empty_result(results: &Value) -> bool {
    match results {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.values().all(|v| v.as_array().is_some_and(Vec::is_empty)),
        _ => false,
    }
}
