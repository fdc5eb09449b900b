//! Search input state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use voyage_cache::{keys, QueryKey};

/// Lifecycle of a search input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    #[default]
    Idle,
    Debouncing,
    Fetching,
    ShowingResults,
    ShowingEmpty,
    ShowingError,
}

impl SearchPhase {
    /// Whether the phase ends a search.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::ShowingResults | Self::ShowingEmpty | Self::ShowingError)
    }
}

impl std::fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Debouncing => write!(f, "debouncing"),
            Self::Fetching => write!(f, "fetching"),
            Self::ShowingResults => write!(f, "showing results"),
            Self::ShowingEmpty => write!(f, "showing empty"),
            Self::ShowingError => write!(f, "showing error"),
        }
    }
}

/// State of one search input, from first keystroke until it is cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSession {
    /// Normalized text as typed.
    pub raw_query: String,
    /// Text that survived the debounce window.
    pub debounced_query: Option<String>,
    /// Extra filters; `Null` or `{}` means none.
    pub filters: Value,
    /// Key of the most recently issued fetch.
    pub last_issued_key: Option<QueryKey>,
}

impl SearchSession {
    /// Cache key for searching `query` with the session's filters.
    pub fn key_for(&self, query: &str) -> QueryKey {
        if has_filters(&self.filters) {
            keys::filtered_search(query, &self.filters)
        } else {
            keys::global(query)
        }
    }

    /// Forget the query while keeping the filters.
    pub fn reset(&mut self) {
        self.raw_query.clear();
        self.debounced_query = None;
        self.last_issued_key = None;
    }
}

fn has_filters(filters: &Value) -> bool {
    match filters {
        Value::Object(map) => map.values().any(|v| !v.is_null()),
        Value::Null => false,
        _ => true,
    }
}
