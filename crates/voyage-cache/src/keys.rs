//! Query key registry.
//!
//! Every cacheable read is named here so that equivalent requests always
//! share a key. Keys nest under their domain root:
//!
//! ```text
//! properties
//! ├── properties:list:{...filters}
//! ├── properties:featured
//! ├── properties:detail:42
//! └── properties:reviews-for:42
//! ```

use serde::Serialize;
use serde_json::{json, Value};
use voyage_data::Domain;

use crate::{QueryKey, SyncError};

/// Root of a domain; matches every key in it.
pub fn all(domain: Domain) -> QueryKey {
    QueryKey::domain(domain)
}

/// Parent of every filtered list in a domain.
pub fn lists(domain: Domain) -> QueryKey {
    all(domain).with("list")
}

/// A filtered list. `None` and empty filters share a key.
pub fn list<F: Serialize>(domain: Domain, filters: Option<&F>) -> Result<QueryKey, SyncError> {
    lists(domain)
        .with_serialized(filters)
        .map_err(|e| SyncError::InvalidParams(e.to_string()))
}

/// A list filtered by raw JSON parameters.
pub fn list_params(domain: Domain, params: &Value) -> QueryKey {
    lists(domain).with_params(params)
}

pub fn featured(domain: Domain) -> QueryKey {
    all(domain).with("featured")
}

pub fn detail(domain: Domain, id: u64) -> QueryKey {
    all(domain).with("detail").with(id)
}

/// Reviews nested under a property or package.
pub fn reviews_for(domain: Domain, id: u64) -> QueryKey {
    all(domain).with("reviews-for").with(id)
}

/// Review listing, optionally only approved reviews.
pub fn reviews(approved: bool) -> QueryKey {
    let params = if approved { json!({ "approved": true }) } else { json!({}) };
    list_params(Domain::Reviews, &params)
}

pub fn property_types() -> QueryKey {
    all(Domain::Reference).with("property-types")
}

pub fn amenities() -> QueryKey {
    all(Domain::Reference).with("amenities")
}

pub fn locations() -> QueryKey {
    all(Domain::Reference).with("locations")
}

pub fn destinations(featured: Option<bool>) -> QueryKey {
    all(Domain::Reference)
        .with("destinations")
        .with_params(&json!({ "featured": featured }))
}

/// Global search for a normalized term.
pub fn global(term: &str) -> QueryKey {
    all(Domain::Search).with("global").with(term)
}

/// Search scoped by filters as well as a term.
pub fn filtered_search(term: &str, filters: &Value) -> QueryKey {
    global(term).with_params(filters)
}
