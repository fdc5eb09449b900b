//! Cache entries.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use voyage_data::FetchError;

use crate::QueryKey;

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    /// Created, nothing fetched yet.
    #[default]
    Idle,
    /// A fetch for this key is in flight.
    Fetching,
    /// The last fetch succeeded.
    Success,
    /// The last fetch failed. Previous data, if any, is kept.
    Error,
}

impl std::fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Fetching => write!(f, "fetching"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A cached read.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: QueryKey,
    pub data: Option<Value>,
    /// When `data` was last confirmed (fetched or written).
    pub fetched_at: Option<Instant>,
    /// Freshness window; zero once invalidated.
    pub stale_after: Duration,
    pub status: FetchStatus,
    pub error: Option<Arc<FetchError>>,
}

impl CacheEntry {
    /// Create an empty entry.
    pub fn new(key: QueryKey, stale_after: Duration) -> Self {
        Self {
            key,
            data: None,
            fetched_at: None,
            stale_after,
            status: FetchStatus::Idle,
            error: None,
        }
    }

    /// Whether the data is within its freshness window at `now`.
    pub fn is_fresh_at(&self, now: Instant) -> bool {
        match self.fetched_at {
            Some(at) if self.data.is_some() => now.saturating_duration_since(at) < self.stale_after,
            _ => false,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Instant::now())
    }

    /// Time since the data was confirmed.
    pub fn age(&self) -> Option<Duration> {
        self.fetched_at.map(|at| at.elapsed())
    }

    /// Whether the entry was force-invalidated.
    pub fn is_invalidated(&self) -> bool {
        self.stale_after.is_zero()
    }
}
