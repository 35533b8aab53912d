//! Shared daemon state.
//!
//! [`AppContext`] is built once at startup and shared by every connection
//! task. The external collaborators (record store, used-port store, status
//! cache, query connector, port probe) come in through [`Collaborators`], so
//! the daemon and the tests can wire different implementations.

use crate::auth::{Authenticator, Principal};
use crate::cache::{MemoryCache, StatusCache, StatusEntry};
use crate::config::{Config, ListenConfig};
use crate::ids::ConnectionId;
use crate::ports::{PortAllocator, PortProbe, TcpProbe};
use crate::rooms::{ConnectionHandle, FeatureRegistry, RoomHub};
use crate::session::{QuerySettings, SessionRegistry};
use crate::status::StatusBroadcaster;
use crate::store::{MemoryStore, RecordStore, UsedPortStore};
use std::sync::Arc;
use tracing::debug;
use voxfleet_proto::{Feature, QueryConnector, UnavailableConnector};

/// External systems the daemon talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn RecordStore>,
    pub used_ports: Arc<dyn UsedPortStore>,
    pub cache: Arc<dyn StatusCache>,
    pub connector: Arc<dyn QueryConnector>,
    pub probe: Arc<dyn PortProbe>,
}

impl Collaborators {
    /// In-process collaborators seeded from `config`.
    ///
    /// No query transport is linked in: every `manage_server` ends in a
    /// `bot_connection_error` until an embedder supplies a connector.
    pub fn in_memory(config: &Config) -> Self {
        let store = Arc::new(MemoryStore::from_config(config));

        let cache = Arc::new(MemoryCache::new());
        for seed in &config.statuses {
            let key = format!(
                "{}{}",
                config.cache.status_prefix,
                Feature::Server.room(seed.server_id)
            );
            cache.set(
                &key,
                StatusEntry {
                    status: seed.status.clone(),
                    onlines: seed.onlines,
                },
            );
        }

        Self {
            store: store.clone(),
            used_ports: store,
            cache,
            connector: Arc::new(UnavailableConnector),
            probe: Arc::new(TcpProbe::new(config.ports.probe_host)),
        }
    }
}

pub struct AppContext {
    /// Daemon name from `[server]`.
    pub server_name: String,
    pub listen: ListenConfig,
    pub auth: Authenticator,
    pub store: Arc<dyn RecordStore>,
    pub ports: PortAllocator,
    pub rooms: Arc<RoomHub>,
    pub broadcaster: Arc<StatusBroadcaster>,
    pub sessions: SessionRegistry,
    servers: FeatureRegistry,
    bots: FeatureRegistry,
    rank_systems: FeatureRegistry,
}

impl AppContext {
    pub fn new(config: &Config, collaborators: Collaborators) -> Arc<Self> {
        let Collaborators {
            store,
            used_ports,
            cache,
            connector,
            probe,
        } = collaborators;

        let rooms = Arc::new(RoomHub::new());
        let broadcaster = Arc::new(StatusBroadcaster::new(cache, Arc::clone(&rooms)));

        let servers = FeatureRegistry::new(Feature::Server, Arc::clone(&rooms))
            .with_broadcaster(Arc::clone(&broadcaster), &config.cache.status_prefix);
        let bots = FeatureRegistry::new(Feature::Bot, Arc::clone(&rooms));
        let rank_systems = FeatureRegistry::new(Feature::Rank, Arc::clone(&rooms));

        Arc::new(Self {
            server_name: config.server.name.clone(),
            listen: config.listen.clone(),
            auth: Authenticator::from_config(&config.principals),
            store,
            ports: PortAllocator::new(config.ports.start..=config.ports.end, used_ports, probe),
            rooms,
            broadcaster,
            sessions: SessionRegistry::new(connector, QuerySettings::from_config(&config.query)),
            servers,
            bots,
            rank_systems,
        })
    }

    pub fn feature(&self, feature: Feature) -> &FeatureRegistry {
        match feature {
            Feature::Server => &self.servers,
            Feature::Bot => &self.bots,
            Feature::Rank => &self.rank_systems,
        }
    }

    /// Register an identified connection with every feature its principal
    /// may use. Returns the features it joined.
    pub fn admit(&self, handle: &ConnectionHandle, principal: &Principal) -> Vec<Feature> {
        Feature::ALL
            .iter()
            .copied()
            .filter(|f| self.feature(*f).add_connection(handle, principal))
            .collect()
    }

    /// Full cleanup for a closed connection: tear down its session, then
    /// leave every feature and room.
    pub async fn disconnect(&self, id: ConnectionId) {
        let had_session = self.sessions.release(id).await;
        let features = Feature::ALL
            .iter()
            .filter(|f| self.feature(**f).remove_connection(id))
            .count();
        let stray = self.rooms.rooms_of(id);
        for room in &stray {
            self.rooms.leave(room, id);
        }
        debug!(conn = %id, had_session, features, stray_rooms = stray.len(), "connection cleaned up");
    }
}
