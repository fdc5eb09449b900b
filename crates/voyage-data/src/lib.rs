//! Remote resource service boundary for the voyage data layer.
//!
//! This crate provides:
//! - `RemoteService` - The transport seam every fetch and write goes through
//! - `ServiceRequest` - Method, path, query pairs and optional JSON body
//! - `FetchError` - Transport failure taxonomy shared by all waiters
//! - `ResourceApi` - Domain-to-endpoint mapping for the travel resources
//! - `HttpService` - `reqwest` transport with timeouts
//! - `InMemoryService` - Fixture-backed transport for tests and local runs

mod api;
mod error;
mod http;
mod memory;
mod models;
mod request;
mod resource;
mod service;
mod timeout;

pub use api::*;
pub use error::*;
pub use http::*;
pub use memory::*;
pub use models::*;
pub use request::*;
pub use resource::*;
pub use service::*;
pub use timeout::*;
