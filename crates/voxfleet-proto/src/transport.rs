//! Query transport seam.
//!
//! A [`QueryConnector`] opens connections to a server's administrative
//! endpoint; the resulting [`QueryTransport`] carries requests and pushes
//! notifications. Subscriptions are explicit handles: dropping the receiver
//! or calling [`QueryTransport::unsubscribe`] ends them, and nothing is keyed
//! by event-name strings.

use crate::command::{NotifyKind, Notification, QueryCommand};
use crate::error::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Identifier of a live notification subscription on one transport.
pub type SubscriptionId = u64;

/// Where and how to reach a server's administrative query interface.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEndpoint {
    /// Host name or address.
    pub host: String,
    /// Query port.
    pub port: u16,
    /// Query login name.
    pub username: String,
    /// Query password. Never serialized outward.
    #[serde(skip_serializing, default)]
    pub password: String,
}

impl QueryEndpoint {
    /// `host:port` for logging.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for QueryEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A live notification subscription.
///
/// Notifications for every subscribed kind arrive on a single receiver in the
/// order the server emitted them.
#[derive(Debug)]
pub struct EventSubscription {
    /// Handle for [`QueryTransport::unsubscribe`].
    pub id: SubscriptionId,
    /// Ordered notification stream.
    pub events: mpsc::UnboundedReceiver<Notification>,
}

/// Opens query connections.
#[async_trait]
pub trait QueryConnector: Send + Sync {
    /// Open a transport to `endpoint`. No authentication is performed.
    async fn connect(
        &self,
        endpoint: &QueryEndpoint,
    ) -> Result<Arc<dyn QueryTransport>, TransportError>;
}

/// An open query connection.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Send one request and wait for its reply.
    async fn send(&self, command: QueryCommand) -> Result<Value, TransportError>;

    /// Subscribe to one or more notification kinds.
    async fn subscribe(&self, kinds: &[NotifyKind]) -> Result<EventSubscription, TransportError>;

    /// End a subscription. Unknown ids are not an error.
    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), TransportError>;

    /// Close the connection.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Connector used when no query transport is linked into the process.
///
/// Every connection attempt fails with [`TransportError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct UnavailableConnector;

#[async_trait]
impl QueryConnector for UnavailableConnector {
    async fn connect(
        &self,
        endpoint: &QueryEndpoint,
    ) -> Result<Arc<dyn QueryTransport>, TransportError> {
        Err(TransportError::Unavailable(format!(
            "no query transport configured for {}",
            endpoint.address()
        )))
    }
}
