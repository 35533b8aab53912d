//! Status cache change-notification contract.
//!
//! The cache's storage engine is external. The daemon reads single keys and
//! registers prefix listeners that observe `(old, new)` transitions. Listener
//! registration returns an explicit handle; removal takes that handle, so
//! exactly the matching callback is dropped.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod memory;

pub use memory::MemoryCache;

/// Cached status of one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: String,
    #[serde(default)]
    pub onlines: Option<u32>,
}

impl StatusEntry {
    pub fn new(status: impl Into<String>, onlines: u32) -> Self {
        Self {
            status: status.into(),
            onlines: Some(onlines),
        }
    }
}

/// One observed mutation of a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheChange {
    pub key: String,
    pub new: Option<StatusEntry>,
    pub old: Option<StatusEntry>,
}

/// Callback invoked for every change under a listener's prefix.
///
/// Runs on the mutating task; must not block.
pub type ChangeHandler = Arc<dyn Fn(&CacheChange) + Send + Sync>;

/// Handle returned by [`StatusCache::on_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(pub(crate) u64);

pub trait StatusCache: Send + Sync {
    fn get(&self, key: &str) -> Option<StatusEntry>;

    /// Register `handler` for keys starting with `prefix`.
    fn on_change(&self, prefix: &str, handler: ChangeHandler) -> ListenerHandle;

    /// Remove one listener. Returns `false` for an unknown handle.
    fn off_change(&self, handle: ListenerHandle) -> bool;

    /// Number of registered listeners.
    fn listener_count(&self) -> usize;
}
