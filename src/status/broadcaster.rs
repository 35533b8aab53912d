//! Turns status-cache transitions into room-scoped `serverStatusUpdated`
//! events.
//!
//! One cache listener per key prefix. A change under `<prefix><room>` is
//! delivered to `<room>`; the server id is the room name minus the server
//! feature prefix.

use crate::cache::{CacheChange, ChangeHandler, ListenerHandle, StatusCache, StatusEntry};
use crate::rooms::RoomHub;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use voxfleet_proto::{ClientEvent, Feature, RecordId, StatusUpdate};

/// Status reported for a server whose cache entry disappeared.
pub const OFFLINE_STATUS: &str = "offline";

/// Build the update for one transition, or `None` when nothing changed.
pub fn status_update(
    server_id: RecordId,
    new: Option<&StatusEntry>,
    old: Option<&StatusEntry>,
) -> Option<StatusUpdate> {
    if new == old {
        return None;
    }
    let update = match (new, old) {
        (Some(new), old) => StatusUpdate {
            server_id,
            status: new.status.clone(),
            onlines: new.onlines.unwrap_or(0),
            previous_status: old.map(|o| o.status.clone()),
            previous_onlines: old.map(|o| o.onlines.unwrap_or(0)),
        },
        (None, Some(old)) => StatusUpdate {
            server_id,
            status: OFFLINE_STATUS.to_string(),
            onlines: 0,
            previous_status: Some(old.status.clone()),
            previous_onlines: Some(old.onlines.unwrap_or(0)),
        },
        (None, None) => return None,
    };
    Some(update)
}

pub struct StatusBroadcaster {
    cache: Arc<dyn StatusCache>,
    rooms: Arc<RoomHub>,
    listeners: Mutex<HashMap<String, ListenerHandle>>,
}

impl StatusBroadcaster {
    pub fn new(cache: Arc<dyn StatusCache>, rooms: Arc<RoomHub>) -> Self {
        Self {
            cache,
            rooms,
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Register the listener for `prefix`. Idempotent; returns `false` if one
    /// was already registered.
    pub fn attach(&self, prefix: &str) -> bool {
        let mut listeners = self.listeners.lock();
        if listeners.contains_key(prefix) {
            return false;
        }
        let rooms = Arc::clone(&self.rooms);
        let owned_prefix = prefix.to_string();
        let handler: ChangeHandler =
            Arc::new(move |change: &CacheChange| deliver(&rooms, &owned_prefix, change));
        let handle = self.cache.on_change(prefix, handler);
        listeners.insert(prefix.to_string(), handle);
        info!(prefix, "status listener attached");
        true
    }

    /// Remove the listener for `prefix`, and only that one.
    pub fn detach(&self, prefix: &str) -> bool {
        let handle = self.listeners.lock().remove(prefix);
        match handle {
            Some(handle) => {
                self.cache.off_change(handle);
                info!(prefix, "status listener detached");
                true
            }
            None => false,
        }
    }

    pub fn detach_all(&self) -> usize {
        let handles: Vec<ListenerHandle> =
            self.listeners.lock().drain().map(|(_, h)| h).collect();
        for handle in &handles {
            self.cache.off_change(*handle);
        }
        handles.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

fn deliver(rooms: &RoomHub, prefix: &str, change: &CacheChange) {
    let Some(room) = change.key.strip_prefix(prefix) else {
        return;
    };
    let server_id = room
        .strip_prefix(&Feature::Server.room_prefix())
        .and_then(|id| id.parse::<RecordId>().ok());
    let Some(server_id) = server_id else {
        warn!(key = %change.key, "status key does not name a server room");
        crate::metrics::record_status_broadcast("unroutable");
        return;
    };

    match status_update(server_id, change.new.as_ref(), change.old.as_ref()) {
        Some(update) => {
            let reached = rooms.broadcast(room, &ClientEvent::ServerStatusUpdated(update));
            debug!(room, server_id, reached, "status update broadcast");
            crate::metrics::record_status_broadcast("emitted");
        }
        None => {
            crate::metrics::record_status_broadcast("suppressed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::ids::ConnectionId;
    use crate::rooms::ConnectionHandle;

    #[test]
    fn identical_values_are_suppressed() {
        let entry = StatusEntry::new("online", 2);
        assert!(status_update(1, Some(&entry), Some(&entry)).is_none());
        assert!(status_update(1, None, None).is_none());
    }

    #[test]
    fn cold_start_defaults_online_count() {
        let entry = StatusEntry {
            status: "online".into(),
            onlines: None,
        };
        let update = status_update(4, Some(&entry), None).unwrap();
        assert_eq!(update.onlines, 0);
        assert_eq!(update.previous_status, None);
        assert_eq!(update.previous_onlines, None);
    }

    #[test]
    fn removal_reports_offline() {
        let old = StatusEntry::new("online", 9);
        let update = status_update(4, None, Some(&old)).unwrap();
        assert_eq!(update.status, OFFLINE_STATUS);
        assert_eq!(update.onlines, 0);
        assert_eq!(update.previous_onlines, Some(9));
    }

    #[test]
    fn attach_is_idempotent_per_prefix() {
        let cache = Arc::new(MemoryCache::new());
        let broadcaster = StatusBroadcaster::new(cache.clone(), Arc::new(RoomHub::new()));
        assert!(broadcaster.attach("status:"));
        assert!(!broadcaster.attach("status:"));
        assert_eq!(cache.listener_count(), 1);

        assert!(broadcaster.detach("status:"));
        assert!(!broadcaster.detach("status:"));
        assert_eq!(cache.listener_count(), 0);
    }

    #[test]
    fn change_reaches_server_room() {
        let cache = Arc::new(MemoryCache::new());
        let rooms = Arc::new(RoomHub::new());
        let broadcaster = StatusBroadcaster::new(cache.clone(), rooms.clone());
        broadcaster.attach("status:");

        let (watcher, mut rx) = ConnectionHandle::channel(ConnectionId::new(), 8);
        let (other, mut other_rx) = ConnectionHandle::channel(ConnectionId::new(), 8);
        rooms.join("server-12", &watcher);
        rooms.join("server-13", &other);

        cache.set("status:server-12", StatusEntry::new("online", 5));
        cache.set("status:server-12", StatusEntry::new("online", 5));

        match rx.try_recv() {
            Ok(ClientEvent::ServerStatusUpdated(update)) => {
                assert_eq!(update.server_id, 12);
                assert_eq!(update.onlines, 5);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(rx.try_recv().is_err(), "duplicate change must be suppressed");
        assert!(other_rx.try_recv().is_err());
    }
}
