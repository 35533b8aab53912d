//! Unified error handling for voxfleet.
//!
//! This module provides the error hierarchy for the daemon, with automatic
//! conversions, client reply generation, and metric labeling.

use crate::ids::ConnectionId;
use crate::session::SessionState;
use thiserror::Error;
use voxfleet_proto::{ClientEvent, Feature, RecordId, TransportError};

// ============================================================================
// Session Errors (administrative query sessions)
// ============================================================================

/// Errors raised while establishing or driving a protocol session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("session is not ready (state: {0})")]
    NotReady(SessionState),

    #[error("session has no open transport")]
    NotConnected,

    /// The session was torn down while the operation was in flight.
    #[error("session was torn down")]
    Cancelled,
}

impl SessionError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.error_code(),
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::NotReady(_) => "not_ready",
            Self::NotConnected => "not_connected",
            Self::Cancelled => "cancelled",
        }
    }
}

// ============================================================================
// Store Errors (record store / used-port store)
// ============================================================================

/// Record store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "store_unavailable",
        }
    }
}

// ============================================================================
// Allocation Errors (port allocator)
// ============================================================================

/// Port allocation failures. Fatal to one provisioning attempt only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("no available port in {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AllocError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoAvailablePort { .. } => "no_available_port",
            Self::Store(e) => e.error_code(),
        }
    }
}

// ============================================================================
// Registry Errors (feature registries / rooms)
// ============================================================================

/// Malformed registry operations. Logged; the operation is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    #[error("record {0} has no owner")]
    MissingOwner(RecordId),
}

impl RegistryError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownConnection(_) => "unknown_connection",
            Self::MissingOwner(_) => "missing_owner",
        }
    }
}

// ============================================================================
// Request Errors (client request processing)
// ============================================================================

/// Errors that can occur while processing a client request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("first frame must be hello")]
    NotIdentified,

    #[error("connection already identified")]
    AlreadyIdentified,

    #[error("authentication failed")]
    AuthFailed,

    #[error("not admitted to the {0} feature")]
    NotAdmitted(Feature),

    #[error("unknown server {0}")]
    UnknownServer(RecordId),

    #[error("server {0} belongs to another tenant")]
    Forbidden(RecordId),

    #[error("no administrative session is open")]
    NoSession,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Alloc(#[from] AllocError),
}

impl RequestError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidFrame(_) => "invalid_frame",
            Self::NotIdentified => "not_identified",
            Self::AlreadyIdentified => "already_identified",
            Self::AuthFailed => "auth_failed",
            Self::NotAdmitted(_) => "not_admitted",
            Self::UnknownServer(_) => "unknown_server",
            Self::Forbidden(_) => "forbidden",
            Self::NoSession => "no_session",
            Self::Registry(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
            Self::Alloc(e) => e.error_code(),
        }
    }

    /// Convert to a client `error` frame.
    ///
    /// Returns `None` for errors that are only logged (malformed registry
    /// operations are silent no-ops).
    pub fn to_event(&self) -> Option<ClientEvent> {
        match self {
            Self::Registry(_) => None,
            _ => Some(ClientEvent::error(self.error_code(), self.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_codes_pass_through() {
        let err = SessionError::from(TransportError::Closed);
        assert_eq!(err.error_code(), "closed");
    }

    #[test]
    fn registry_errors_have_no_reply() {
        let err = RequestError::from(RegistryError::UnknownConnection(ConnectionId::new()));
        assert!(err.to_event().is_none());
    }

    #[test]
    fn exhausted_allocation_reports_code() {
        let err = RequestError::from(AllocError::NoAvailablePort {
            start: 4000,
            end: 4001,
        });
        match err.to_event() {
            Some(ClientEvent::Error { code, .. }) => assert_eq!(code, "no_available_port"),
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}
