//! Error types for the query transport seam.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results produced by a query transport.
pub type Result<T, E = TransportError> = std::result::Result<T, E>;

/// Failures reported by a [`QueryTransport`](crate::QueryTransport) or
/// [`QueryConnector`](crate::QueryConnector).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The administrative endpoint could not be reached.
    #[error("connect to {endpoint} failed: {reason}")]
    Connect {
        /// `host:port` of the endpoint.
        endpoint: String,
        /// Underlying cause as reported by the transport.
        reason: String,
    },

    /// The server answered a request with a non-zero error id.
    #[error("query error {id}: {message}")]
    Rejected {
        /// Protocol error id.
        id: u32,
        /// Protocol error message.
        message: String,
    },

    /// The connection was closed underneath an in-flight request.
    #[error("transport closed")]
    Closed,

    /// A request did not complete in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// No transport implementation is available in this process.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    /// Static code used for metric labels and client-facing error events.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect_failed",
            Self::Rejected { .. } => "rejected",
            Self::Closed => "closed",
            Self::Timeout(_) => "timeout",
            Self::Unavailable(_) => "unavailable",
        }
    }
}
