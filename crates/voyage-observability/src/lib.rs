//! Observability infrastructure for the voyage data layer.
//!
//! This crate provides:
//! - `LogConfig` / `init_logging` - Global `tracing` subscriber setup
//! - `SyncMetrics` - Cache and fetch counters shared by a store
//! - `MetricsSnapshot` - Point-in-time copy of the counters for reporting

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;
