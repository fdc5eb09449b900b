//! Public SDK for the voyage travel data layer.
//!
//! [`TravelClient`] is the page-level entry point; the underlying crates are
//! re-exported for callers that need the pieces directly:
//!
//! ```ignore
//! use voyage_sdk::prelude::*;
//!
//! let service = Arc::new(HttpService::new(base_url, &TimeoutConfig::default())?);
//! let client = TravelClient::new(service, StalenessPolicy::default());
//!
//! let home = client.homepage().await;
//! if home.is_error {
//!     tracing::warn!(error = ?home.error, "homepage failed");
//! }
//! client.toggle_favorite(42, true).await?;
//! ```

mod client;

pub use client::*;

pub use voyage_cache;
pub use voyage_data;
pub use voyage_observability;
pub use voyage_search;
pub use voyage_timing;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::TravelClient;
    pub use voyage_cache::*;
    pub use voyage_data::*;
    pub use voyage_observability::*;
    pub use voyage_search::*;
    pub use voyage_timing::*;
}
