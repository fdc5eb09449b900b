//! The binding shape handed to the rendering layer.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::{CacheEntry, FetchStatus, SyncError};

/// `{ data, is_loading, is_error, error }` for one read.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub data: Option<Value>,
    pub is_loading: bool,
    pub is_error: bool,
    pub error: Option<SyncError>,
}

impl QueryResult {
    /// Nothing requested.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Waiting on the first fetch.
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    pub fn success(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn failure(error: SyncError) -> Self {
        Self {
            is_error: true,
            error: Some(error),
            ..Self::default()
        }
    }

    /// Result of an awaited read.
    pub fn settled(outcome: Result<Value, SyncError>) -> Self {
        match outcome {
            Ok(data) => Self::success(data),
            Err(error) => Self::failure(error),
        }
    }

    /// Current view of a cache entry without fetching.
    pub fn from_entry(entry: Option<&CacheEntry>) -> Self {
        let Some(entry) = entry else {
            return Self::idle();
        };
        Self {
            data: entry.data.clone(),
            is_loading: entry.status == FetchStatus::Fetching && entry.data.is_none(),
            is_error: entry.status == FetchStatus::Error,
            error: entry.error.clone().map(SyncError::Fetch),
        }
    }

    /// Decode the data into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>, SyncError> {
        match &self.data {
            Some(data) => Ok(Some(serde_json::from_value(data.clone())?)),
            None => Ok(None),
        }
    }

    /// Fold several results into one, OR-ing the flags.
    ///
    /// `data` is an object with one member per named result; the first error
    /// wins.
    pub fn combine<'a>(parts: impl IntoIterator<Item = (&'a str, QueryResult)>) -> Self {
        let mut data = serde_json::Map::new();
        let mut combined = Self::default();
        for (name, part) in parts {
            combined.is_loading |= part.is_loading;
            combined.is_error |= part.is_error;
            if combined.error.is_none() {
                combined.error = part.error;
            }
            data.insert(name.to_string(), part.data.unwrap_or(Value::Null));
        }
        combined.data = Some(Value::Object(data));
        combined
    }

    /// A serializable view for printing.
    pub fn view(&self) -> QueryView {
        QueryView {
            data: self.data.clone(),
            is_loading: self.is_loading,
            is_error: self.is_error,
            error: self.error.as_ref().map(ToString::to_string),
        }
    }
}

/// Serializable form of [`QueryResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryView {
    pub data: Option<Value>,
    pub is_loading: bool,
    pub is_error: bool,
    pub error: Option<String>,
}
