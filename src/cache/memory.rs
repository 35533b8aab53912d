//! In-process status cache.
//!
//! Stands in for the external cache when the daemon runs standalone, and is
//! what tests drive to produce change notifications.

use super::{CacheChange, ChangeHandler, ListenerHandle, StatusCache, StatusEntry};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

struct Listener {
    prefix: String,
    handler: ChangeHandler,
}

#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, StatusEntry>,
    listeners: DashMap<ListenerHandle, Listener>,
    next_handle: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `entry` under `key` and notify matching listeners.
    pub fn set(&self, key: &str, entry: StatusEntry) {
        let old = self.entries.insert(key.to_string(), entry.clone());
        self.notify(CacheChange {
            key: key.to_string(),
            new: Some(entry),
            old,
        });
    }

    /// Delete `key` and notify matching listeners.
    pub fn remove(&self, key: &str) {
        let old = self.entries.remove(key).map(|(_, v)| v);
        self.notify(CacheChange {
            key: key.to_string(),
            new: None,
            old,
        });
    }

    fn notify(&self, change: CacheChange) {
        // Clone handlers out first; a handler may touch the cache.
        let handlers: Vec<ChangeHandler> = self
            .listeners
            .iter()
            .filter(|l| change.key.starts_with(&l.value().prefix))
            .map(|l| l.value().handler.clone())
            .collect();
        trace!(key = %change.key, listeners = handlers.len(), "cache change");
        for handler in handlers {
            handler(&change);
        }
    }
}

impl StatusCache for MemoryCache {
    fn get(&self, key: &str) -> Option<StatusEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    fn on_change(&self, prefix: &str, handler: ChangeHandler) -> ListenerHandle {
        let handle = ListenerHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(
            handle,
            Listener {
                prefix: prefix.to_string(),
                handler,
            },
        );
        handle
    }

    fn off_change(&self, handle: ListenerHandle) -> bool {
        self.listeners.remove(&handle).is_some()
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
