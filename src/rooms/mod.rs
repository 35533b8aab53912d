//! Named fan-out groups and per-connection outbound handles.
//!
//! A room is `<feature>-<recordId>` or `<feature>-owner-<user>`. Membership is tracked in both
//! directions so a disconnect can leave every room of a feature without
//! scanning the whole hub.

use crate::ids::ConnectionId;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tracing::{debug, warn};
use voxfleet_proto::ClientEvent;

pub mod feature;

pub use feature::{FeatureRegistry, HandlerKind};

/// Outbound side of one client connection.
///
/// Room broadcasts go through a bounded queue and never wait: a full queue
/// drops the event and counts it. Events addressed to this connection alone
/// (its administrative session's lifecycle and presence) use a separate
/// unbounded lane and are never dropped, so the owner's client view stays in
/// step with the session.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    rooms: mpsc::Sender<ClientEvent>,
    direct: mpsc::UnboundedSender<ClientEvent>,
}

impl ConnectionHandle {
    /// A handle plus the receivers its connection task drains.
    pub fn channel(id: ConnectionId, capacity: usize) -> (Self, Outbound) {
        let (rooms, room_rx) = mpsc::channel(capacity);
        let (direct, direct_rx) = mpsc::unbounded_channel();
        let handle = Self { id, rooms, direct };
        let outbound = Outbound {
            direct: direct_rx,
            rooms: room_rx,
        };
        (handle, outbound)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a room broadcast. Returns `false` if it was dropped.
    pub fn send(&self, event: ClientEvent) -> bool {
        match self.rooms.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(conn = %self.id, event = event.name(), "outbound queue full, dropping event");
                crate::metrics::record_event_dropped();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Queue an event for this connection only. Lossless and ordered; fails
    /// only once the connection is gone.
    pub fn deliver(&self, event: ClientEvent) -> bool {
        self.direct.send(event).is_ok()
    }
}

/// Receiving side of a [`ConnectionHandle`].
#[derive(Debug)]
pub struct Outbound {
    direct: mpsc::UnboundedReceiver<ClientEvent>,
    rooms: mpsc::Receiver<ClientEvent>,
}

impl Outbound {
    /// Next event, direct events first. Cancel safe.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        tokio::select! {
            biased;
            Some(event) = self.direct.recv() => Some(event),
            Some(event) = self.rooms.recv() => Some(event),
            else => None,
        }
    }

    pub fn try_recv(&mut self) -> Result<ClientEvent, TryRecvError> {
        match self.direct.try_recv() {
            Ok(event) => Ok(event),
            Err(_) => self.rooms.try_recv(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RoomHub {
    rooms: DashMap<String, HashMap<ConnectionId, ConnectionHandle>>,
    memberships: DashMap<ConnectionId, HashSet<String>>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `handle` to `room`. Returns `false` if it was already a member.
    pub fn join(&self, room: &str, handle: &ConnectionHandle) -> bool {
        let added = self
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(handle.id(), handle.clone())
            .is_none();
        self.memberships
            .entry(handle.id())
            .or_default()
            .insert(room.to_string());
        if added {
            debug!(conn = %handle.id(), room, "joined room");
        }
        added
    }

    /// Remove `id` from `room`. Empty rooms are dropped.
    pub fn leave(&self, room: &str, id: ConnectionId) -> bool {
        let removed = self
            .rooms
            .get_mut(room)
            .map(|mut members| members.remove(&id).is_some())
            .unwrap_or(false);
        self.rooms.remove_if(room, |_, members| members.is_empty());

        if let Some(mut rooms) = self.memberships.get_mut(&id) {
            rooms.remove(room);
        }
        self.memberships.remove_if(&id, |_, rooms| rooms.is_empty());
        removed
    }

    /// Leave every room of `id` whose name starts with `prefix`.
    pub fn leave_matching(&self, id: ConnectionId, prefix: &str) -> usize {
        let targets: Vec<String> = self
            .memberships
            .get(&id)
            .map(|rooms| {
                rooms
                    .iter()
                    .filter(|r| r.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        targets.iter().filter(|room| self.leave(room, id)).count()
    }

    /// Send `event` to every member of `room`. Returns how many accepted it.
    pub fn broadcast(&self, room: &str, event: &ClientEvent) -> usize {
        let members: Vec<ConnectionHandle> = match self.rooms.get(room) {
            Some(members) => members.values().cloned().collect(),
            None => return 0,
        };
        members
            .iter()
            .filter(|handle| handle.send(event.clone()))
            .count()
    }

    pub fn members(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Rooms `id` belongs to, sorted.
    pub fn rooms_of(&self, id: ConnectionId) -> Vec<String> {
        let mut rooms: Vec<String> = self
            .memberships
            .get(&id)
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(capacity: usize) -> (ConnectionHandle, Outbound) {
        ConnectionHandle::channel(ConnectionId::new(), capacity)
    }

    #[test]
    fn broadcast_reaches_members_only() {
        let hub = RoomHub::new();
        let (a, mut rx_a) = handle(4);
        let (b, mut rx_b) = handle(4);
        hub.join("server-1", &a);
        hub.join("server-2", &b);

        let sent = hub.broadcast("server-1", &ClientEvent::error("x", "y"));
        assert_eq!(sent, 1);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn leave_matching_only_touches_prefix() {
        let hub = RoomHub::new();
        let (a, _rx) = handle(1);
        hub.join("server-1", &a);
        hub.join("server-owner-alice", &a);
        hub.join("bot-3", &a);

        assert_eq!(hub.leave_matching(a.id(), "server-"), 2);
        assert_eq!(hub.rooms_of(a.id()), vec!["bot-3".to_string()]);
        assert_eq!(hub.room_count(), 1);
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (a, _rx) = handle(1);
        assert!(a.send(ClientEvent::error("a", "1")));
        assert!(!a.send(ClientEvent::error("a", "2")));
    }

    #[test]
    fn direct_events_survive_a_full_room_queue() {
        let (a, mut rx) = handle(1);
        assert!(a.send(ClientEvent::error("room", "1")));
        assert!(!a.send(ClientEvent::error("room", "2")));
        for clid in 10..15 {
            assert!(a.deliver(ClientEvent::error("direct", clid.to_string())));
        }

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ClientEvent::Error { code, message } = event {
                seen.push((code, message));
            }
        }
        let expected: Vec<(String, String)> = (10..15)
            .map(|clid| ("direct".to_string(), clid.to_string()))
            .chain(std::iter::once(("room".to_string(), "1".to_string())))
            .collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn recv_prefers_direct_events() {
        let (a, mut rx) = handle(4);
        a.send(ClientEvent::error("room", "1"));
        a.deliver(ClientEvent::error("direct", "1"));
        match rx.recv().await {
            Some(ClientEvent::Error { code, .. }) => assert_eq!(code, "direct"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn join_is_idempotent() {
        let hub = RoomHub::new();
        let (a, _rx) = handle(1);
        assert!(hub.join("rank-1", &a));
        assert!(!hub.join("rank-1", &a));
        assert_eq!(hub.members("rank-1"), vec![a.id()]);
    }
}
