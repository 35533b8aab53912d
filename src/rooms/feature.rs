//! Per-feature connection registry.
//!
//! Each feature area (server management, bots, rank systems) keeps its own
//! set of active connections, the request handlers each one has attached,
//! and the rooms it joined. The server feature also owns the lifetime of the
//! status broadcaster's cache listener: attached with the first active
//! connection, removed with the last.

use super::{ConnectionHandle, RoomHub};
use crate::auth::Principal;
use crate::error::RegistryError;
use crate::ids::ConnectionId;
use crate::status::StatusBroadcaster;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use voxfleet_proto::{Feature, OwnedRecord};

/// Request handler kinds a connection can have attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// `list_servers` / `list_bots` / `list_rank_systems`.
    List,
    /// `manage_server`.
    ManageServer,
    /// Commands forwarded through the administrative session.
    AdminCommand,
    /// `reserve_port`.
    ReservePort,
}

impl HandlerKind {
    pub fn for_feature(feature: Feature) -> &'static [HandlerKind] {
        match feature {
            Feature::Server => &[
                HandlerKind::List,
                HandlerKind::ManageServer,
                HandlerKind::AdminCommand,
                HandlerKind::ReservePort,
            ],
            Feature::Bot | Feature::Rank => &[HandlerKind::List],
        }
    }
}

struct ActiveConnection {
    handle: ConnectionHandle,
    principal: Principal,
    handlers: HashSet<HandlerKind>,
}

pub struct FeatureRegistry {
    feature: Feature,
    rooms: Arc<RoomHub>,
    broadcaster: Option<(Arc<StatusBroadcaster>, String)>,
    active: DashMap<ConnectionId, ActiveConnection>,
    // Serializes first-add / last-remove so the listener is never orphaned.
    lifecycle: Mutex<()>,
}

impl FeatureRegistry {
    pub fn new(feature: Feature, rooms: Arc<RoomHub>) -> Self {
        Self {
            feature,
            rooms,
            broadcaster: None,
            active: DashMap::new(),
            lifecycle: Mutex::new(()),
        }
    }

    /// Tie the broadcaster's listener for `prefix` to this feature's activity.
    pub fn with_broadcaster(mut self, broadcaster: Arc<StatusBroadcaster>, prefix: &str) -> Self {
        self.broadcaster = Some((broadcaster, prefix.to_string()));
        self
    }

    pub fn feature(&self) -> Feature {
        self.feature
    }

    /// Admit a connection. Returns `false` if `principal` may not join this
    /// feature.
    pub fn add_connection(&self, handle: &ConnectionHandle, principal: &Principal) -> bool {
        let id = handle.id();
        if !principal.allows(self.feature) {
            debug!(conn = %id, feature = %self.feature, "principal not admitted");
            return false;
        }

        let _guard = self.lifecycle.lock();
        if self.active.remove(&id).is_some() {
            let left = self.rooms.leave_matching(id, &self.feature.room_prefix());
            debug!(conn = %id, feature = %self.feature, rooms_left = left, "replacing prior registration");
        }

        let mut handlers = HashSet::new();
        for kind in HandlerKind::for_feature(self.feature) {
            if handlers.insert(*kind) {
                trace!(conn = %id, feature = %self.feature, handler = ?kind, "handler attached");
            }
        }

        self.active.insert(
            id,
            ActiveConnection {
                handle: handle.clone(),
                principal: principal.clone(),
                handlers,
            },
        );

        if self.active.len() == 1
            && let Some((broadcaster, prefix)) = &self.broadcaster
        {
            broadcaster.attach(prefix);
        }
        info!(conn = %id, feature = %self.feature, user = %principal.user, "connection admitted");
        true
    }

    /// Drop a connection: leave every room of this feature, detach its
    /// handlers, and release the broadcaster listener if it was the last one.
    pub fn remove_connection(&self, id: ConnectionId) -> bool {
        let left = self.rooms.leave_matching(id, &self.feature.room_prefix());

        let _guard = self.lifecycle.lock();
        let removed = self.active.remove(&id).is_some();
        if removed
            && self.active.is_empty()
            && let Some((broadcaster, prefix)) = &self.broadcaster
        {
            broadcaster.detach(prefix);
        }
        if removed {
            debug!(conn = %id, feature = %self.feature, rooms_left = left, "connection removed");
        }
        removed
    }

    pub fn is_active(&self, id: ConnectionId) -> bool {
        self.active.contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Whether `id` has `kind` attached here.
    pub fn handles(&self, id: ConnectionId, kind: HandlerKind) -> bool {
        self.active
            .get(&id)
            .is_some_and(|c| c.handlers.contains(&kind))
    }

    pub fn handler_count(&self, id: ConnectionId) -> usize {
        self.active.get(&id).map_or(0, |c| c.handlers.len())
    }

    pub fn principal(&self, id: ConnectionId) -> Option<Principal> {
        self.active.get(&id).map(|c| c.principal.clone())
    }

    /// Keep the records the caller may see, join one room per record plus
    /// the caller's own owner room, and return the visible subset.
    pub fn join_visible<R: OwnedRecord>(
        &self,
        id: ConnectionId,
        records: Vec<R>,
    ) -> Result<Vec<R>, RegistryError> {
        let (handle, principal) = self
            .active
            .get(&id)
            .map(|c| (c.handle.clone(), c.principal.clone()))
            .ok_or(RegistryError::UnknownConnection(id))?;

        let mut visible = Vec::with_capacity(records.len());
        for record in records {
            if record.owner().is_empty() {
                let err = RegistryError::MissingOwner(record.id());
                warn!(conn = %id, feature = %self.feature, error = %err, "skipping record");
                continue;
            }
            if principal.can_see(&record) {
                self.rooms.join(&self.feature.room(record.id()), &handle);
                visible.push(record);
            }
        }
        self.rooms.join(&self.feature.owner_room(&principal.user), &handle);
        Ok(visible)
    }
}
