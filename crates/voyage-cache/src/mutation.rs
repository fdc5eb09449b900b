//! Optimistic writes with snapshot rollback.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use voyage_data::{Domain, FetchError};
use voyage_observability::Counter;

use crate::store::Snapshot;
use crate::{keys, CacheStore, QueryKey, SyncError};

/// Kind of write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A write against one resource domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRequest {
    pub domain: Domain,
    pub kind: MutationKind,
    /// Target record. For creates this is learned from the response.
    pub id: Option<u64>,
    /// Keys outside the domain that the write also affects.
    pub also_invalidate: Vec<QueryKey>,
}

impl MutationRequest {
    pub fn create(domain: Domain) -> Self {
        Self::new(domain, MutationKind::Create, None)
    }

    pub fn update(domain: Domain, id: u64) -> Self {
        Self::new(domain, MutationKind::Update, Some(id))
    }

    pub fn delete(domain: Domain, id: u64) -> Self {
        Self::new(domain, MutationKind::Delete, Some(id))
    }

    fn new(domain: Domain, kind: MutationKind, id: Option<u64>) -> Self {
        Self {
            domain,
            kind,
            id,
            also_invalidate: Vec::new(),
        }
    }

    /// Also invalidate `key` once the write succeeds.
    pub fn with_invalidation(mut self, key: QueryKey) -> Self {
        self.also_invalidate.push(key);
        self
    }
}

/// Runs writes through the cache.
///
/// Before the request is sent, every entry under the domain root is
/// snapshotted and the speculative change applied. Success invalidates the
/// domain root and the record's detail key; failure restores the snapshot
/// exactly. A mutation future dropped before it settles also rolls back.
#[derive(Debug, Clone)]
pub struct MutationExecutor {
    store: CacheStore,
}

impl MutationExecutor {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Apply `optimistic`, run `send`, then confirm or roll back.
    pub async fn mutate<U, F, Fut>(
        &self,
        request: MutationRequest,
        optimistic: U,
        send: F,
    ) -> Result<Value, SyncError>
    where
        U: Fn(&Value) -> Option<Value>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, FetchError>>,
    {
        let root = keys::all(request.domain);
        let mut snapshot = self.store.snapshot(&root);
        let applied = self.store.apply_optimistic(&mut snapshot, &optimistic);
        let mut rollback = Rollback {
            store: &self.store,
            snapshot: Some(snapshot),
        };
        tracing::debug!(
            domain = %request.domain,
            operation = %request.kind,
            entries = applied,
            "optimistic change applied"
        );

        match send().await {
            Ok(response) => {
                rollback.disarm();
                let id = request
                    .id
                    .or_else(|| response.get("id").and_then(Value::as_u64));

                let mut targets = vec![root];
                if let Some(id) = id {
                    targets.push(keys::detail(request.domain, id));
                }
                targets.extend(request.also_invalidate);
                for target in &targets {
                    self.store.invalidate(target);
                }
                tracing::info!(domain = %request.domain, operation = %request.kind, id = ?id, "mutation confirmed");
                Ok(response)
            }
            Err(error) => {
                let restored = rollback.restore();
                tracing::warn!(
                    domain = %request.domain,
                    operation = %request.kind,
                    entries = restored,
                    error = %error,
                    "mutation failed; rolled back"
                );
                Err(SyncError::Mutation {
                    operation: request.kind,
                    source: Arc::new(error),
                })
            }
        }
    }
}

/// Restores its snapshot unless disarmed, including when dropped mid-flight.
struct Rollback<'a> {
    store: &'a CacheStore,
    snapshot: Option<Snapshot>,
}

impl Rollback<'_> {
    fn disarm(&mut self) {
        self.snapshot = None;
    }

    fn restore(&mut self) -> usize {
        match self.snapshot.take() {
            Some(snapshot) => {
                self.store.metrics().record(Counter::Rollback);
                self.store.restore(snapshot)
            }
            None => 0,
        }
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{optimistic, StalenessPolicy};
    use serde_json::json;
    use std::time::Duration;

    fn seeded() -> CacheStore {
        let store = CacheStore::new(StalenessPolicy::default());
        store.write(
            &keys::list::<Value>(Domain::Properties, None).unwrap(),
            json!([{"id": 41, "is_favorite": false}, {"id": 42, "is_favorite": false}]),
        );
        store.write(&keys::detail(Domain::Properties, 42), json!({"id": 42, "is_favorite": false}));
        store.write(&keys::featured(Domain::Packages), json!([{"id": 42}]));
        store
    }

    fn favorite_flags(store: &CacheStore) -> (Value, Value) {
        let list = store.read(&keys::list::<Value>(Domain::Properties, None).unwrap()).unwrap().data.unwrap();
        let detail = store.read(&keys::detail(Domain::Properties, 42)).unwrap().data.unwrap();
        (list[1]["is_favorite"].clone(), detail["is_favorite"].clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_favorite_toggle_is_visible_before_confirmation() {
        let store = seeded();
        let executor = MutationExecutor::new(store.clone());
        let observer = store.clone();

        let result = executor
            .mutate(
                MutationRequest::update(Domain::Properties, 42),
                optimistic::set_field(42, "is_favorite", json!(true)),
                || async move {
                    // Seen by the UI while the request is in flight.
                    assert_eq!(favorite_flags(&observer), (json!(true), json!(true)));
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(json!({"id": 42, "is_favorite": true}))
                },
            )
            .await;

        assert_eq!(result.unwrap(), json!({"id": 42, "is_favorite": true}));
        let list = store.read(&keys::list::<Value>(Domain::Properties, None).unwrap()).unwrap();
        let detail = store.read(&keys::detail(Domain::Properties, 42)).unwrap();
        assert!(list.is_invalidated());
        assert!(detail.is_invalidated());
        // Other domains are untouched.
        assert!(store.read(&keys::featured(Domain::Packages)).unwrap().is_fresh());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_toggle_rolls_back_exactly() {
        let store = seeded();
        let executor = MutationExecutor::new(store.clone());
        let before: Vec<_> = store
            .keys()
            .into_iter()
            .map(|k| {
                let e = store.read(&k).unwrap();
                (k, e.data, e.fetched_at, e.stale_after, e.status)
            })
            .collect();

        let err = executor
            .mutate(
                MutationRequest::update(Domain::Properties, 42),
                optimistic::set_field(42, "is_favorite", json!(true)),
                || async { Err(FetchError::http(500, "server error")) },
            )
            .await
            .unwrap_err();

        assert!(err.is_rollback());
        assert_eq!(favorite_flags(&store), (json!(false), json!(false)));
        let after: Vec<_> = store
            .keys()
            .into_iter()
            .map(|k| {
                let e = store.read(&k).unwrap();
                (k, e.data, e.fetched_at, e.stale_after, e.status)
            })
            .collect();
        assert_eq!(before, after);
        assert_eq!(store.metrics().get(Counter::Rollback), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extra_invalidations_apply_on_success() {
        let store = seeded();
        let reviews_key = keys::reviews_for(Domain::Properties, 42);
        store.write(&reviews_key, json!([]));
        let executor = MutationExecutor::new(store.clone());

        executor
            .mutate(
                MutationRequest::create(Domain::Reviews).with_invalidation(reviews_key.clone()),
                optimistic::none(),
                || async { Ok(json!({"id": 8, "property": 42})) },
            )
            .await
            .unwrap();

        assert!(store.read(&reviews_key).unwrap().is_invalidated());
        assert!(store.read(&keys::detail(Domain::Properties, 42)).unwrap().is_fresh());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_rollback_keeps_confirmed_invalidation() {
        let store = seeded();
        let executor = MutationExecutor::new(store.clone());
        let detail_key = keys::detail(Domain::Properties, 42);

        let rename = executor.mutate(
            MutationRequest::update(Domain::Properties, 42),
            optimistic::merge_record(42, json!({"name": "renamed"})),
            || async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(json!({"id": 42, "name": "renamed"}))
            },
        );
        let favorite = async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            executor
                .mutate(
                    MutationRequest::update(Domain::Properties, 42),
                    optimistic::set_field(42, "is_favorite", json!(true)),
                    || async {
                        tokio::time::sleep(Duration::from_millis(19)).await;
                        Err(FetchError::http(500, "server error"))
                    },
                )
                .await
        };
        let (renamed, favorited) = tokio::join!(rename, favorite);
        assert!(renamed.is_ok());
        assert!(favorited.unwrap_err().is_rollback());

        // The failed toggle is undone, but the confirmed rename still forces a refetch.
        let detail = store.read(&detail_key).unwrap();
        assert_eq!(detail.data.as_ref().unwrap()["is_favorite"], json!(false));
        assert_eq!(detail.data.as_ref().unwrap()["name"], json!("renamed"));
        assert!(!detail.is_fresh());
        assert!(detail.is_invalidated());
        let list = store.read(&keys::list::<Value>(Domain::Properties, None).unwrap()).unwrap();
        assert!(list.is_invalidated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_mutation_rolls_back() {
        let store = seeded();
        let executor = MutationExecutor::new(store.clone());

        let pending = executor.mutate(
            MutationRequest::delete(Domain::Properties, 41),
            optimistic::remove_record(41),
            || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Value::Null)
            },
        );
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());

        let list = store.read(&keys::list::<Value>(Domain::Properties, None).unwrap()).unwrap();
        assert_eq!(list.data.unwrap().as_array().map(Vec::len), Some(2));
    }
}
