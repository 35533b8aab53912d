//! Record store abstraction.
//!
//! Persistence is an external collaborator. The daemon only needs
//! owner-filtered reads of fleet records and an atomic used-port set.

use crate::auth::OwnerFilter;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashSet;
use voxfleet_proto::{BotRecord, ManagedServer, RankSystemRecord, RecordId};

pub mod memory;

pub use memory::MemoryStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Servers visible through `filter`.
    async fn servers(&self, filter: &OwnerFilter) -> Result<Vec<ManagedServer>, StoreError>;

    /// One server by id, regardless of owner.
    async fn server(&self, id: RecordId) -> Result<Option<ManagedServer>, StoreError>;

    async fn bots(&self, filter: &OwnerFilter) -> Result<Vec<BotRecord>, StoreError>;

    async fn rank_systems(&self, filter: &OwnerFilter)
    -> Result<Vec<RankSystemRecord>, StoreError>;
}

/// The set of ports held by provisioned servers.
///
/// Reads always go to the store; callers must not cache the result beyond
/// one operation.
#[async_trait]
pub trait UsedPortStore: Send + Sync {
    async fn used_ports(&self) -> Result<HashSet<u16>, StoreError>;

    async fn is_port_used(&self, port: u16) -> Result<bool, StoreError>;

    /// Record `port` as used. Returns `false` if it was already claimed.
    /// Must be atomic with respect to concurrent claims.
    async fn claim_port(&self, port: u16) -> Result<bool, StoreError>;

    /// Forget a claim. Returns `false` if the port was not claimed.
    async fn release_port(&self, port: u16) -> Result<bool, StoreError>;
}
