//! Page-level data bindings.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use voyage_cache::{
    keys, optimistic, CacheEvent, CacheStore, MutationExecutor, MutationRequest, QueryKey, QueryResult,
    StalenessPolicy, Subscription, SyncError,
};
use voyage_data::{
    Domain, ExperienceFilters, FetchError, PackageFilters, PropertyFilters, ResourceApi, SharedService,
};
use voyage_observability::SyncMetrics;
use voyage_search::{SearchConfig, SearchOrchestrator};

/// Cached, deduplicated access to the travel resources.
///
/// Every read goes through one shared [`CacheStore`], so equivalent reads
/// from different parts of a page share a single request, and answers with
/// a [`QueryResult`]. Writes go through a [`MutationExecutor`]: cached data
/// changes before the server confirms and rolls back if it refuses.
///
/// Cloning is cheap; clones share the cache.
#[derive(Debug, Clone)]
pub struct TravelClient {
    api: ResourceApi,
    store: CacheStore,
    mutations: MutationExecutor,
    search: SearchConfig,
}

impl TravelClient {
    pub fn new(service: SharedService, policy: StalenessPolicy) -> Self {
        Self::with_store(service, CacheStore::new(policy))
    }

    /// Build around an existing store, e.g. one sharing metrics.
    pub fn with_store(service: SharedService, store: CacheStore) -> Self {
        Self {
            api: ResourceApi::new(service),
            mutations: MutationExecutor::new(store.clone()),
            store,
            search: SearchConfig::default(),
        }
    }

    pub fn with_search_config(mut self, config: SearchConfig) -> Self {
        self.search = config;
        self
    }

    pub fn api(&self) -> &ResourceApi {
        &self.api
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<SyncMetrics> {
        self.store.metrics()
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    /// A search-as-you-type session over this client's cache.
    pub fn search(&self) -> SearchOrchestrator {
        SearchOrchestrator::for_api(self.store.clone(), self.api.clone(), self.search.clone())
    }

    // Reads

    pub async fn properties(&self, filters: &PropertyFilters) -> QueryResult {
        self.filtered_list(Domain::Properties, filters).await
    }

    pub async fn featured_properties(&self) -> QueryResult {
        self.featured(Domain::Properties).await
    }

    pub async fn property(&self, id: u64) -> QueryResult {
        self.detail(Domain::Properties, id).await
    }

    pub async fn property_reviews(&self, id: u64) -> QueryResult {
        let api = self.api.clone();
        self.read(keys::reviews_for(Domain::Properties, id), move || async move {
            api.reviews_for(Domain::Properties, id).await
        })
        .await
    }

    pub async fn packages(&self, filters: &PackageFilters) -> QueryResult {
        self.filtered_list(Domain::Packages, filters).await
    }

    pub async fn featured_packages(&self) -> QueryResult {
        self.featured(Domain::Packages).await
    }

    pub async fn package(&self, id: u64) -> QueryResult {
        self.detail(Domain::Packages, id).await
    }

    pub async fn experiences(&self, filters: &ExperienceFilters) -> QueryResult {
        self.filtered_list(Domain::Experiences, filters).await
    }

    /// All reviews, or only approved ones.
    pub async fn reviews(&self, approved: bool) -> QueryResult {
        let api = self.api.clone();
        self.read(keys::reviews(approved), move || async move { api.reviews(approved).await })
            .await
    }

    pub async fn property_types(&self) -> QueryResult {
        let api = self.api.clone();
        self.read(keys::property_types(), move || async move { api.property_types().await })
            .await
    }

    pub async fn amenities(&self) -> QueryResult {
        let api = self.api.clone();
        self.read(keys::amenities(), move || async move { api.amenities().await })
            .await
    }

    pub async fn locations(&self) -> QueryResult {
        let api = self.api.clone();
        self.read(keys::locations(), move || async move { api.locations().await })
            .await
    }

    pub async fn destinations(&self, featured: Option<bool>) -> QueryResult {
        let api = self.api.clone();
        self.read(keys::destinations(featured), move || async move {
            api.destinations(featured).await
        })
        .await
    }

    /// One-shot search. Terms below the minimum length answer idle without
    /// a request.
    pub async fn global_search(&self, term: &str) -> QueryResult {
        let term = self.search.normalize(term);
        if !self.search.is_searchable(&term) {
            return QueryResult::idle();
        }
        let api = self.api.clone();
        let key = keys::global(&term);
        self.read(key, move || async move { api.global_search(&term).await })
            .await
    }

    /// Featured properties, featured packages and approved reviews.
    ///
    /// The three reads run concurrently; the combined result is loading or
    /// failed if any part is.
    pub async fn homepage(&self) -> QueryResult {
        let (properties, packages, reviews) = futures::join!(
            self.featured_properties(),
            self.featured_packages(),
            self.reviews(true)
        );
        QueryResult::combine([
            ("featured_properties", properties),
            ("featured_packages", packages),
            ("reviews", reviews),
        ])
    }

    // Prefetch

    /// Warm a property detail, e.g. on hover.
    pub async fn prefetch_property(&self, id: u64) -> Result<(), SyncError> {
        self.prefetch_detail(Domain::Properties, id).await
    }

    pub async fn prefetch_package(&self, id: u64) -> Result<(), SyncError> {
        self.prefetch_detail(Domain::Packages, id).await
    }

    /// Warm what the first page needs.
    pub async fn prefetch_critical(&self) -> Result<(), SyncError> {
        let properties = self.prefetch_featured(Domain::Properties);
        let packages = self.prefetch_featured(Domain::Packages);
        futures::try_join!(properties, packages)?;
        tracing::debug!("critical data prefetched");
        Ok(())
    }

    // Writes

    pub async fn create_property(&self, body: Value) -> Result<Value, SyncError> {
        self.create(MutationRequest::create(Domain::Properties), body).await
    }

    pub async fn update_property(&self, id: u64, patch: Value) -> Result<Value, SyncError> {
        self.update(Domain::Properties, id, patch).await
    }

    pub async fn delete_property(&self, id: u64) -> Result<Value, SyncError> {
        self.delete(Domain::Properties, id).await
    }

    pub async fn create_package(&self, body: Value) -> Result<Value, SyncError> {
        self.create(MutationRequest::create(Domain::Packages), body).await
    }

    pub async fn update_package(&self, id: u64, patch: Value) -> Result<Value, SyncError> {
        self.update(Domain::Packages, id, patch).await
    }

    pub async fn delete_package(&self, id: u64) -> Result<Value, SyncError> {
        self.delete(Domain::Packages, id).await
    }

    /// Post a review. The reviewed property's or package's nested review
    /// list is invalidated along with the reviews domain.
    pub async fn create_review(&self, body: Value) -> Result<Value, SyncError> {
        let mut request = MutationRequest::create(Domain::Reviews);
        if let Some(property) = body.get("property").and_then(Value::as_u64) {
            request = request.with_invalidation(keys::reviews_for(Domain::Properties, property));
        }
        if let Some(package) = body.get("package").and_then(Value::as_u64) {
            request = request.with_invalidation(keys::reviews_for(Domain::Packages, package));
        }
        self.create(request, body).await
    }

    pub async fn approve_review(&self, id: u64) -> Result<Value, SyncError> {
        let api = self.api.clone();
        self.mutations
            .mutate(
                MutationRequest::update(Domain::Reviews, id),
                optimistic::set_field(id, "approved", json!(true)),
                move || async move { api.approve_review(id).await },
            )
            .await
    }

    pub async fn delete_review(&self, id: u64) -> Result<Value, SyncError> {
        self.delete(Domain::Reviews, id).await
    }

    /// Mark a property as a favorite (or not). Every cached copy flips
    /// immediately.
    pub async fn toggle_favorite(&self, property_id: u64, favorited: bool) -> Result<Value, SyncError> {
        let api = self.api.clone();
        self.mutations
            .mutate(
                MutationRequest::update(Domain::Properties, property_id),
                optimistic::set_field(property_id, "is_favorite", json!(favorited)),
                move || async move {
                    api.update(Domain::Properties, property_id, json!({ "is_favorite": favorited }))
                        .await
                },
            )
            .await
    }

    // Cache passthrough

    /// Listen for changes to keys under `prefix`.
    pub fn subscribe(
        &self,
        prefix: QueryKey,
        listener: impl Fn(&CacheEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.store.subscribe(prefix, listener)
    }

    /// Mark everything under `prefix` stale.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        self.store.invalidate(prefix)
    }

    async fn read<F, Fut>(&self, key: QueryKey, fetch: F) -> QueryResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
    {
        QueryResult::settled(self.store.ensure_with_policy(&key, fetch).await)
    }

    async fn filtered_list<F: Serialize>(&self, domain: Domain, filters: &F) -> QueryResult {
        let params = match serde_json::to_value(filters) {
            Ok(params) => params,
            Err(error) => return QueryResult::failure(error.into()),
        };
        let api = self.api.clone();
        self.read(keys::list_params(domain, &params), move || async move {
            api.list(domain, &params).await
        })
        .await
    }

    async fn featured(&self, domain: Domain) -> QueryResult {
        let api = self.api.clone();
        self.read(keys::featured(domain), move || async move { api.featured(domain).await })
            .await
    }

    async fn detail(&self, domain: Domain, id: u64) -> QueryResult {
        let api = self.api.clone();
        self.read(keys::detail(domain, id), move || async move { api.detail(domain, id).await })
            .await
    }

    async fn prefetch_detail(&self, domain: Domain, id: u64) -> Result<(), SyncError> {
        let api = self.api.clone();
        self.store
            .prefetch(&keys::detail(domain, id), move || async move { api.detail(domain, id).await })
            .await
    }

    async fn prefetch_featured(&self, domain: Domain) -> Result<(), SyncError> {
        let api = self.api.clone();
        self.store
            .prefetch(&keys::featured(domain), move || async move { api.featured(domain).await })
            .await
    }

    async fn create(&self, request: MutationRequest, body: Value) -> Result<Value, SyncError> {
        let api = self.api.clone();
        let domain = request.domain;
        self.mutations
            .mutate(request, optimistic::none(), move || async move {
                api.create(domain, body).await
            })
            .await
    }

    async fn update(&self, domain: Domain, id: u64, patch: Value) -> Result<Value, SyncError> {
        let api = self.api.clone();
        let updater = optimistic::merge_record(id, patch.clone());
        self.mutations
            .mutate(MutationRequest::update(domain, id), updater, move || async move {
                api.update(domain, id, patch).await
            })
            .await
    }

    async fn delete(&self, domain: Domain, id: u64) -> Result<Value, SyncError> {
        let api = self.api.clone();
        self.mutations
            .mutate(
                MutationRequest::delete(domain, id),
                optimistic::remove_record(id),
                move || async move { api.delete(domain, id).await },
            )
            .await
    }
}
