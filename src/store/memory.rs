//! In-memory record store seeded from configuration.

use super::{RecordStore, UsedPortStore};
use crate::auth::OwnerFilter;
use crate::config::Config;
use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::collections::HashSet;
use voxfleet_proto::{BotRecord, ManagedServer, OwnedRecord, RankSystemRecord, RecordId};

#[derive(Debug, Default)]
pub struct MemoryStore {
    servers: DashMap<RecordId, ManagedServer>,
    bots: DashMap<RecordId, BotRecord>,
    rank_systems: DashMap<RecordId, RankSystemRecord>,
    used_ports: DashSet<u16>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from the seed sections of `config`.
    pub fn from_config(config: &Config) -> Self {
        let store = Self::new();
        for seed in &config.servers {
            store.insert_server(seed.clone().into());
        }
        for seed in &config.bots {
            store.insert_bot(seed.clone().into());
        }
        for seed in &config.rank_systems {
            store.insert_rank_system(seed.clone().into());
        }
        for port in &config.used_ports {
            store.used_ports.insert(*port);
        }
        store
    }

    pub fn insert_server(&self, server: ManagedServer) {
        self.servers.insert(server.id, server);
    }

    pub fn insert_bot(&self, bot: BotRecord) {
        self.bots.insert(bot.id, bot);
    }

    pub fn insert_rank_system(&self, rank: RankSystemRecord) {
        self.rank_systems.insert(rank.id, rank);
    }
}

/// Clone the records `filter` admits, ordered by id.
fn visible<R>(map: &DashMap<RecordId, R>, filter: &OwnerFilter) -> Vec<R>
where
    R: OwnedRecord + Clone,
{
    let mut out: Vec<R> = map
        .iter()
        .filter(|entry| filter.matches(entry.value().owner()))
        .map(|entry| entry.value().clone())
        .collect();
    out.sort_by_key(|r| r.id());
    out
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn servers(&self, filter: &OwnerFilter) -> Result<Vec<ManagedServer>, StoreError> {
        Ok(visible(&self.servers, filter))
    }

    async fn server(&self, id: RecordId) -> Result<Option<ManagedServer>, StoreError> {
        Ok(self.servers.get(&id).map(|s| s.value().clone()))
    }

    async fn bots(&self, filter: &OwnerFilter) -> Result<Vec<BotRecord>, StoreError> {
        Ok(visible(&self.bots, filter))
    }

    async fn rank_systems(
        &self,
        filter: &OwnerFilter,
    ) -> Result<Vec<RankSystemRecord>, StoreError> {
        Ok(visible(&self.rank_systems, filter))
    }
}

#[async_trait]
impl UsedPortStore for MemoryStore {
    async fn used_ports(&self) -> Result<HashSet<u16>, StoreError> {
        Ok(self.used_ports.iter().map(|p| *p).collect())
    }

    async fn is_port_used(&self, port: u16) -> Result<bool, StoreError> {
        Ok(self.used_ports.contains(&port))
    }

    async fn claim_port(&self, port: u16) -> Result<bool, StoreError> {
        Ok(self.used_ports.insert(port))
    }

    async fn release_port(&self, port: u16) -> Result<bool, StoreError> {
        Ok(self.used_ports.remove(&port).is_some())
    }
}
