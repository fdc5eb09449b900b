//! Cache and fetch counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counter categories recorded by the data layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// Fresh cache hit served without network activity.
    Hit,
    /// Stale entry served while a background refresh was scheduled.
    StaleHit,
    /// Absent entry; caller waited for a fetch.
    Miss,
    /// Request factory invoked (one per real network round trip).
    NetworkCall,
    /// Caller joined a request already in flight.
    DedupJoin,
    /// Background refresh scheduled for a stale entry.
    BackgroundRefresh,
    /// Fetch settled with an error.
    FetchFailure,
    /// Entry marked stale by an invalidation.
    Invalidation,
    /// Speculative change applied to a cache entry.
    OptimisticApplied,
    /// Mutation failed and its snapshot was replayed.
    Rollback,
    /// Search result discarded because the query moved on.
    SuppressedResult,
}

/// Lock-free counters shared by a cache store and its collaborators.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    network_calls: AtomicU64,
    dedup_joins: AtomicU64,
    background_refreshes: AtomicU64,
    fetch_failures: AtomicU64,
    invalidations: AtomicU64,
    optimistic_applied: AtomicU64,
    rollbacks: AtomicU64,
    suppressed_results: AtomicU64,
}

impl SyncMetrics {
    /// Create a zeroed set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by one.
    pub fn record(&self, counter: Counter) {
        self.add(counter, 1);
    }

    /// Increment a counter by `n`.
    pub fn add(&self, counter: Counter, n: u64) {
        self.slot(counter).fetch_add(n, Ordering::Relaxed);
    }

    /// Current value of a counter.
    pub fn get(&self, counter: Counter) -> u64 {
        self.slot(counter).load(Ordering::Relaxed)
    }

    /// Copy every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.get(Counter::Hit),
            stale_hits: self.get(Counter::StaleHit),
            misses: self.get(Counter::Miss),
            network_calls: self.get(Counter::NetworkCall),
            dedup_joins: self.get(Counter::DedupJoin),
            background_refreshes: self.get(Counter::BackgroundRefresh),
            fetch_failures: self.get(Counter::FetchFailure),
            invalidations: self.get(Counter::Invalidation),
            optimistic_applied: self.get(Counter::OptimisticApplied),
            rollbacks: self.get(Counter::Rollback),
            suppressed_results: self.get(Counter::SuppressedResult),
        }
    }

    fn slot(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::Hit => &self.hits,
            Counter::StaleHit => &self.stale_hits,
            Counter::Miss => &self.misses,
            Counter::NetworkCall => &self.network_calls,
            Counter::DedupJoin => &self.dedup_joins,
            Counter::BackgroundRefresh => &self.background_refreshes,
            Counter::FetchFailure => &self.fetch_failures,
            Counter::Invalidation => &self.invalidations,
            Counter::OptimisticApplied => &self.optimistic_applied,
            Counter::Rollback => &self.rollbacks,
            Counter::SuppressedResult => &self.suppressed_results,
        }
    }
}

/// Point-in-time copy of [`SyncMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub network_calls: u64,
    pub dedup_joins: u64,
    pub background_refreshes: u64,
    pub fetch_failures: u64,
    pub invalidations: u64,
    pub optimistic_applied: u64,
    pub rollbacks: u64,
    pub suppressed_results: u64,
}

impl MetricsSnapshot {
    /// Fraction of reads answered from cache (fresh or stale).
    pub fn hit_ratio(&self) -> f64 {
        let served = self.hits + self.stale_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    /// Format as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Format as human-readable summary.
    pub fn to_summary(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "Cache: {} hit, {} stale, {} miss ({:.0}% served from cache)",
            self.hits,
            self.stale_hits,
            self.misses,
            self.hit_ratio() * 100.0
        ));
        lines.push(format!(
            "Network: {} calls, {} joined in flight, {} background refreshes, {} failures",
            self.network_calls, self.dedup_joins, self.background_refreshes, self.fetch_failures
        ));
        lines.push(format!(
            "Writes: {} invalidations, {} optimistic, {} rollbacks",
            self.invalidations, self.optimistic_applied, self.rollbacks
        ));
        if self.suppressed_results > 0 {
            lines.push(format!("Search: {} stale results suppressed", self.suppressed_results));
        }
        lines.join("\n")
    }
}
