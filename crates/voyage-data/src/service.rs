//! Transport seam for the remote resource service.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{FetchError, ServiceRequest};

/// A remote resource service speaking JSON.
///
/// Reads must be idempotent. Writes return the affected resource (or `null`
/// for deletes).
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Send a request and return the decoded JSON body.
    async fn send(&self, request: ServiceRequest) -> Result<Value, FetchError>;
}

#[async_trait]
impl<S: RemoteService + ?Sized> RemoteService for Arc<S> {
    async fn send(&self, request: ServiceRequest) -> Result<Value, FetchError> {
        (**self).send(request).await
    }
}

/// Shared handle to a remote service.
pub type SharedService = Arc<dyn RemoteService>;
