//! Search tuning.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Debounce and query length settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Quiet window before a query is issued, in milliseconds.
    pub debounce_ms: u64,
    /// Queries shorter than this (in characters) never reach the network.
    pub min_query_len: usize,
    /// Input is truncated to this many characters.
    pub max_query_len: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            min_query_len: 2,
            max_query_len: 100,
        }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Trim `raw` and cap it at `max_query_len` characters.
    pub fn normalize(&self, raw: &str) -> String {
        raw.trim().chars().take(self.max_query_len).collect::<String>().trim_end().to_string()
    }

    /// Whether a normalized query is long enough to search for.
    pub fn is_searchable(&self, query: &str) -> bool {
        query.chars().count() >= self.min_query_len
    }
}
