//! Client-side query cache for the voyage data layer.
//!
//! This crate provides:
//! - `QueryKey` - Canonical, hierarchical identifiers for cacheable reads
//! - `keys` - The key registry for every resource domain
//! - `StalenessPolicy` - Per-class freshness windows
//! - `RequestDeduplicator` - Single-flight execution per key
//! - `CacheStore` - Stale-while-revalidate store with change listeners
//! - `MutationExecutor` - Optimistic writes with snapshot rollback
//!
//! # Example
//!
//! ```ignore
//! use voyage_cache::{keys, CacheStore, StalenessPolicy};
//! use voyage_data::Domain;
//!
//! let store = CacheStore::new(StalenessPolicy::default());
//! let key = keys::detail(Domain::Properties, 42);
//! let data = store.ensure_with_policy(&key, || api.detail(Domain::Properties, 42)).await?;
//! ```

mod dedupe;
mod entry;
mod error;
mod events;
mod key;
pub mod keys;
mod mutation;
pub mod optimistic;
mod policy;
mod result;
mod store;

pub use dedupe::*;
pub use entry::*;
pub use error::*;
pub use events::*;
pub use key::*;
pub use mutation::*;
pub use policy::*;
pub use result::*;
pub use store::*;
