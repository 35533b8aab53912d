//! Principals and seed records.
//!
//! The daemon ships in-memory collaborators; these sections populate them at
//! startup. Embedders with a real store simply leave them empty.

use crate::auth::Scope;
use serde::Deserialize;
use voxfleet_proto::{BotRecord, Feature, ManagedServer, QueryEndpoint, RankSystemRecord, RecordId};

/// An access token and what it grants.
#[derive(Debug, Clone, Deserialize)]
pub struct PrincipalConfig {
    /// Bearer token sent in `hello`.
    pub token: String,
    /// User the token authenticates as.
    pub user: String,
    /// Visibility scope.
    pub scope: Scope,
    /// Feature areas the token may join. Empty grants all of them.
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// A managed server record.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSeed {
    pub id: RecordId,
    pub name: String,
    pub owner: String,
    pub host: String,
    pub query_port: u16,
    pub query_username: String,
    pub query_password: String,
    pub voice_port: u16,
    #[serde(default)]
    pub slots: u32,
}

impl From<ServerSeed> for ManagedServer {
    fn from(seed: ServerSeed) -> Self {
        ManagedServer {
            id: seed.id,
            name: seed.name,
            owner: seed.owner,
            query: QueryEndpoint {
                host: seed.host,
                port: seed.query_port,
                username: seed.query_username,
                password: seed.query_password,
            },
            voice_port: seed.voice_port,
            slots: seed.slots,
        }
    }
}

/// A bot record.
#[derive(Debug, Clone, Deserialize)]
pub struct BotSeed {
    pub id: RecordId,
    pub name: String,
    pub owner: String,
    pub server_id: RecordId,
}

impl From<BotSeed> for BotRecord {
    fn from(seed: BotSeed) -> Self {
        BotRecord {
            id: seed.id,
            name: seed.name,
            owner: seed.owner,
            server_id: seed.server_id,
        }
    }
}

/// A rank system record.
#[derive(Debug, Clone, Deserialize)]
pub struct RankSystemSeed {
    pub id: RecordId,
    pub name: String,
    pub owner: String,
    pub server_id: RecordId,
}

impl From<RankSystemSeed> for RankSystemRecord {
    fn from(seed: RankSystemSeed) -> Self {
        RankSystemRecord {
            id: seed.id,
            name: seed.name,
            owner: seed.owner,
            server_id: seed.server_id,
        }
    }
}

/// Initial status-cache entry for a server.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusSeed {
    pub server_id: RecordId,
    pub status: String,
    pub onlines: Option<u32>,
}
