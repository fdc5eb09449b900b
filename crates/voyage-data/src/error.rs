//! Transport error types.

/// Error type for remote service operations.
///
/// Cloneable so one failure can be handed to every caller waiting on the
/// same request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("failed to decode response: {0}")]
    Deserialization(String),

    #[error("request error: {0}")]
    Request(String),

    #[error("request was cancelled before it settled")]
    Cancelled,
}

impl FetchError {
    /// Create an HTTP error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// HTTP status code, if the service answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the service was unreachable rather than answering with an error.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connection(_))
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Deserialization(e.to_string())
    }
}
