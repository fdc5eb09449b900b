//! Endpoint mapping for the travel resources.

use serde_json::{json, Value};

use crate::{Domain, FetchError, RemoteService, ServiceRequest, SharedService};

/// Maps resource reads and writes onto REST endpoints.
///
/// List reads unwrap paginated `{ "results": [...] }` envelopes so callers
/// always see a bare array.
#[derive(Clone)]
pub struct ResourceApi {
    service: SharedService,
}

impl ResourceApi {
    /// Create an API over a remote service.
    pub fn new(service: SharedService) -> Self {
        Self { service }
    }

    /// The underlying service.
    pub fn service(&self) -> &SharedService {
        &self.service
    }

    /// List a collection with optional filters.
    pub async fn list(&self, domain: Domain, filters: &Value) -> Result<Value, FetchError> {
        let request = ServiceRequest::get(collection(domain)?).filters(filters);
        self.read_list(request).await
    }

    /// Featured entries of a collection.
    pub async fn featured(&self, domain: Domain) -> Result<Value, FetchError> {
        let request = ServiceRequest::get(collection(domain)?).query("is_featured", "true");
        self.read_list(request).await
    }

    /// A single record.
    pub async fn detail(&self, domain: Domain, id: u64) -> Result<Value, FetchError> {
        self.service
            .send(ServiceRequest::get(member(domain, id)?))
            .await
    }

    /// Reviews nested under a property or package.
    pub async fn reviews_for(&self, domain: Domain, id: u64) -> Result<Value, FetchError> {
        let request = ServiceRequest::get(format!("{}reviews/", member(domain, id)?));
        self.read_list(request).await
    }

    /// All reviews, optionally only approved ones.
    pub async fn reviews(&self, approved: bool) -> Result<Value, FetchError> {
        let mut request = ServiceRequest::get("reviews/");
        if approved {
            request = request.query("approved", "true");
        }
        self.read_list(request).await
    }

    pub async fn property_types(&self) -> Result<Value, FetchError> {
        self.read_list(ServiceRequest::get("property-types/")).await
    }

    pub async fn amenities(&self) -> Result<Value, FetchError> {
        self.read_list(ServiceRequest::get("amenities/")).await
    }

    pub async fn locations(&self) -> Result<Value, FetchError> {
        self.read_list(ServiceRequest::get("locations/")).await
    }

    /// Destinations, optionally filtered on the featured flag.
    pub async fn destinations(&self, featured: Option<bool>) -> Result<Value, FetchError> {
        let mut request = ServiceRequest::get("destinations/");
        if let Some(featured) = featured {
            request = request.query("featured", featured.to_string());
        }
        self.read_list(request).await
    }

    /// Search properties and packages at once.
    ///
    /// Both requests run concurrently and either failure fails the whole
    /// search. A blank term answers with empty lists and sends nothing.
    pub async fn global_search(&self, term: &str) -> Result<Value, FetchError> {
        self.search(term, &Value::Null).await
    }

    /// [`global_search`](Self::global_search) narrowed by extra filters,
    /// applied to both collections.
    pub async fn search(&self, term: &str, filters: &Value) -> Result<Value, FetchError> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(json!({ "properties": [], "packages": [] }));
        }

        let request = |path: &str| {
            ServiceRequest::get(path)
                .query("search", term)
                .filters(filters)
        };
        let properties = self.read_list(request("properties/"));
        let packages = self.read_list(request("packages/"));
        let (properties, packages) = futures::try_join!(properties, packages)?;

        Ok(json!({ "properties": properties, "packages": packages }))
    }

    /// Create a record; answers with the created resource.
    pub async fn create(&self, domain: Domain, body: Value) -> Result<Value, FetchError> {
        self.service
            .send(ServiceRequest::post(collection(domain)?).body(body))
            .await
    }

    /// Partially update a record; answers with the updated resource.
    pub async fn update(&self, domain: Domain, id: u64, patch: Value) -> Result<Value, FetchError> {
        self.service
            .send(ServiceRequest::patch(member(domain, id)?).body(patch))
            .await
    }

    /// Delete a record.
    pub async fn delete(&self, domain: Domain, id: u64) -> Result<Value, FetchError> {
        self.service
            .send(ServiceRequest::delete(member(domain, id)?))
            .await
    }

    /// Approve a pending review.
    pub async fn approve_review(&self, id: u64) -> Result<Value, FetchError> {
        self.service
            .send(ServiceRequest::post(format!("reviews/{}/approve/", id)))
            .await
    }

    async fn read_list(&self, request: ServiceRequest) -> Result<Value, FetchError> {
        let body = self.service.send(request).await?;
        Ok(unwrap_results(body))
    }
}

impl std::fmt::Debug for ResourceApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceApi").finish_non_exhaustive()
    }
}

/// Unwrap a paginated envelope into its results array.
///
/// Anything that is neither an envelope nor an array reads as an empty list.
pub fn unwrap_results(body: Value) -> Value {
    match body {
        Value::Array(_) => body,
        Value::Object(mut map) => match map.remove("results") {
            Some(results @ Value::Array(_)) => results,
            _ => Value::Array(Vec::new()),
        },
        _ => Value::Array(Vec::new()),
    }
}

fn collection(domain: Domain) -> Result<&'static str, FetchError> {
    domain
        .collection_path()
        .ok_or_else(|| FetchError::Request(format!("{} has no collection endpoint", domain)))
}

fn member(domain: Domain, id: u64) -> Result<String, FetchError> {
    Ok(format!("{}{}/", collection(domain)?, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryService, Method};
    use std::sync::Arc;

    fn api_with(service: InMemoryService) -> (ResourceApi, Arc<InMemoryService>) {
        let service = Arc::new(service);
        (ResourceApi::new(service.clone()), service)
    }

    #[test]
    fn test_unwrap_results() {
        assert_eq!(unwrap_results(json!([1])), json!([1]));
        assert_eq!(
            unwrap_results(json!({"count": 1, "next": null, "results": [{"id": 1}]})),
            json!([{"id": 1}])
        );
        assert_eq!(unwrap_results(json!({"detail": "x"})), json!([]));
        assert_eq!(unwrap_results(Value::Null), json!([]));
    }

    #[tokio::test]
    async fn test_featured_and_detail_paths() {
        let (api, service) = api_with(
            InMemoryService::new()
                .with_get("properties/?is_featured=true", json!({"results": [{"id": 1}]}))
                .with_get("packages/7/", json!({"id": 7})),
        );

        assert_eq!(api.featured(Domain::Properties).await.unwrap(), json!([{"id": 1}]));
        assert_eq!(api.detail(Domain::Packages, 7).await.unwrap(), json!({"id": 7}));
        assert_eq!(service.total_requests(), 2);
    }

    #[tokio::test]
    async fn test_global_search_runs_both_queries() {
        let (api, service) = api_with(
            InMemoryService::new()
                .with_get("properties/?search=male", json!([{"id": 1}]))
                .with_get("packages/?search=male", json!({"results": []})),
        );

        let results = api.global_search(" male ").await.unwrap();
        assert_eq!(results, json!({"properties": [{"id": 1}], "packages": []}));
        assert_eq!(service.total_requests(), 2);
    }

    #[tokio::test]
    async fn test_search_applies_filters_to_both_collections() {
        let (api, service) = api_with(
            InMemoryService::new()
                .with_get("properties/?search=reef&location=Baa", json!([]))
                .with_get("packages/?search=reef&location=Baa", json!([{"id": 4}])),
        );

        let results = api.search("reef", &json!({"location": "Baa"})).await.unwrap();
        assert_eq!(results["packages"], json!([{"id": 4}]));
        assert_eq!(service.request_count("packages/?search=reef&location=Baa"), 1);
    }

    #[tokio::test]
    async fn test_global_search_blank_term_sends_nothing() {
        let (api, service) = api_with(InMemoryService::new());
        let results = api.global_search("   ").await.unwrap();
        assert_eq!(results, json!({"properties": [], "packages": []}));
        assert_eq!(service.total_requests(), 0);
    }

    #[tokio::test]
    async fn test_writes_use_expected_methods() {
        let (api, service) = api_with(
            InMemoryService::new()
                .with_route(Method::Patch, "properties/42/", json!({"id": 42}))
                .with_route(Method::Post, "reviews/3/approve/", json!({"id": 3, "approved": true})),
        );

        api.update(Domain::Properties, 42, json!({"is_favorite": true}))
            .await
            .unwrap();
        api.approve_review(3).await.unwrap();

        let requests = service.requests();
        assert_eq!(requests[0].method, Method::Patch);
        assert_eq!(requests[0].body, Some(json!({"is_favorite": true})));
        assert_eq!(requests[1].method, Method::Post);
    }

    #[tokio::test]
    async fn test_reference_domain_has_no_collection() {
        let (api, service) = api_with(InMemoryService::new());
        assert!(matches!(
            api.detail(Domain::Reference, 1).await,
            Err(FetchError::Request(_))
        ));
        assert_eq!(service.total_requests(), 0);
    }
}
