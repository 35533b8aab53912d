//! Logging setup, request timing and span constructors.

use crate::config::{LogFormat, LoggingConfig};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Returns `false` if a subscriber was already installed (tests, embedders).
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match config.format {
        LogFormat::Text => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}

/// Guard for timing request handling.
///
/// Records request latency when dropped.
pub struct RequestTimer {
    request: &'static str,
    start: Instant,
}

impl RequestTimer {
    /// Start timing a request.
    pub fn new(request: &'static str) -> Self {
        Self {
            request,
            start: Instant::now(),
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_request_duration(self.request, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use crate::ids::{ConnectionId, SessionId};
    use std::net::SocketAddr;
    use tracing::{Span, info_span};
    use voxfleet_proto::RecordId;

    /// Span for one client connection.
    pub fn connection(conn: ConnectionId, addr: SocketAddr, transport: &'static str) -> Span {
        info_span!("connection", conn = %conn, addr = %addr, transport)
    }

    /// Span for one administrative query session.
    pub fn session(session: SessionId, conn: ConnectionId, server_id: RecordId) -> Span {
        info_span!("session", session = %session, conn = %conn, server_id)
    }
}
