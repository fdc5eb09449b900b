//! Cache error types.

use std::sync::Arc;

use thiserror::Error;
use voyage_data::FetchError;

use crate::MutationKind;

/// Errors surfaced by the cache and mutation layers.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// The fetch behind a read failed. Every deduplicated waiter holds the
    /// same `Arc`.
    #[error("fetch failed: {0}")]
    Fetch(Arc<FetchError>),

    /// A write failed; its optimistic change has been rolled back.
    #[error("{operation} failed and was rolled back: {source}")]
    Mutation {
        operation: MutationKind,
        source: Arc<FetchError>,
    },

    /// Cached JSON did not match the requested type.
    #[error("failed to decode cached data: {0}")]
    Decode(String),

    /// Query parameters have no JSON form and cannot name a cache key.
    #[error("invalid query parameters: {0}")]
    InvalidParams(String),
}

impl SyncError {
    /// The transport failure underneath, if any.
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            Self::Fetch(e) | Self::Mutation { source: e, .. } => Some(e),
            Self::Decode(_) | Self::InvalidParams(_) => None,
        }
    }

    /// Whether this error came from a rolled back mutation.
    pub fn is_rollback(&self) -> bool {
        matches!(self, Self::Mutation { .. })
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
