//! Timeout configuration for the HTTP transport.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeout configuration for service requests.
///
/// The cache layer has no timeouts of its own; a timed out request surfaces
/// as an ordinary fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection timeout in milliseconds.
    pub connect_ms: u64,
    /// Total operation timeout in milliseconds.
    pub total_ms: u64,
}

impl TimeoutConfig {
    /// Create a new timeout configuration.
    pub fn new(connect: Duration, total: Duration) -> Self {
        Self {
            connect_ms: connect.as_millis() as u64,
            total_ms: total.as_millis() as u64,
        }
    }

    /// Create from a single total timeout.
    pub fn from_total(total: Duration) -> Self {
        Self::new(total / 4, total)
    }

    /// Connection timeout.
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    /// Total timeout.
    pub fn total(&self) -> Duration {
        Duration::from_millis(self.total_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::from_total(Duration::from_secs(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_total() {
        let config = TimeoutConfig::from_total(Duration::from_secs(8));
        assert_eq!(config.connect(), Duration::from_secs(2));
        assert_eq!(config.total(), Duration::from_secs(8));
    }

    #[test]
    fn test_default() {
        let config = TimeoutConfig::default();
        assert_eq!(config.total_ms, 10_000);
        assert_eq!(config.connect_ms, 2_500);
    }
}
