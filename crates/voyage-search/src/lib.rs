//! Search-as-you-type for the voyage data layer.
//!
//! This crate provides:
//! - `SearchConfig` - Debounce window and query length limits
//! - `SearchSession` - The transient state of one search input
//! - `SearchPhase` - Where the input is in its lifecycle
//! - `SearchOrchestrator` - Debounced, cached search with stale-result suppression
//!
//! # Example
//!
//! ```ignore
//! use voyage_search::{SearchConfig, SearchOrchestrator};
//!
//! let search = SearchOrchestrator::for_api(store, api, SearchConfig::default());
//! search.set_query("male");
//! let mut updates = search.subscribe();
//! while updates.changed().await.is_ok() {
//!     println!("{}", updates.borrow().phase);
//! }
//! ```

mod config;
mod orchestrator;
mod session;

pub use config::*;
pub use orchestrator::*;
pub use session::*;
