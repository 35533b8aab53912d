//! Connection -> administrative session map.
//!
//! At most one session per client connection. Acquiring a new session tears
//! the previous one down; a session only ever removes its own entry, so a
//! late teardown cannot evict its replacement.

use super::protocol::{ProtocolSession, QuerySettings, SessionMap};
use crate::ids::{ConnectionId, SessionIdGenerator};
use crate::rooms::ConnectionHandle;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;
use voxfleet_proto::{ManagedServer, QueryConnector};

pub struct SessionRegistry {
    sessions: Arc<SessionMap>,
    connector: Arc<dyn QueryConnector>,
    settings: QuerySettings,
    ids: SessionIdGenerator,
}

impl SessionRegistry {
    pub fn new(connector: Arc<dyn QueryConnector>, settings: QuerySettings) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            connector,
            settings,
            ids: SessionIdGenerator::new(),
        }
    }

    /// Open a session to `server` for `owner`, replacing any session the
    /// connection already had. The previous session is fully torn down
    /// before the new one starts connecting.
    pub async fn acquire(
        &self,
        owner: ConnectionHandle,
        server: ManagedServer,
    ) -> Arc<ProtocolSession> {
        let connection = owner.id();
        let session = ProtocolSession::new(
            self.ids.generate(),
            owner,
            server,
            self.settings.clone(),
            Arc::downgrade(&self.sessions),
        );

        let previous = self.sessions.insert(connection, Arc::clone(&session));
        if let Some(previous) = previous
            && previous.id() != session.id()
        {
            debug!(conn = %connection, old = %previous.id(), new = %session.id(), "replacing session");
            previous.disconnect().await;
        }

        session.start(Arc::clone(&self.connector));
        session
    }

    /// Tear down the connection's session, if any. Returns `true` if one
    /// existed.
    pub async fn release(&self, connection: ConnectionId) -> bool {
        let removed = self.sessions.remove(&connection);
        match removed {
            Some((_, session)) => {
                session.disconnect().await;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, connection: ConnectionId) -> Option<Arc<ProtocolSession>> {
        self.sessions.get(&connection).map(|s| Arc::clone(s.value()))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
