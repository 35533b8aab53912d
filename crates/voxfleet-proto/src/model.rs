//! Fleet records as seen by clients.
//!
//! These are read-only views of what the record store holds. Credentials are
//! never serialized outward.

use crate::transport::QueryEndpoint;
use serde::{Deserialize, Serialize};

/// Identifier of a stored record.
pub type RecordId = u64;

/// A record that belongs to exactly one tenant.
pub trait OwnedRecord {
    /// Record identity, used to build room names.
    fn id(&self) -> RecordId;
    /// Owning user.
    fn owner(&self) -> &str;
}

/// A provisioned voice server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedServer {
    /// Server identity.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner: String,
    /// Administrative query endpoint.
    pub query: QueryEndpoint,
    /// Voice port.
    pub voice_port: u16,
    /// Client slot count.
    pub slots: u32,
}

impl OwnedRecord for ManagedServer {
    fn id(&self) -> RecordId {
        self.id
    }

    fn owner(&self) -> &str {
        &self.owner
    }
}

/// A bot attached to a managed server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotRecord {
    /// Bot identity.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner: String,
    /// Server the bot connects to.
    pub server_id: RecordId,
}

impl OwnedRecord for BotRecord {
    fn id(&self) -> RecordId {
        self.id
    }

    fn owner(&self) -> &str {
        &self.owner
    }
}

/// A rank system configured for a managed server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankSystemRecord {
    /// Rank system identity.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner: String,
    /// Server the rank system tracks.
    pub server_id: RecordId,
}

impl OwnedRecord for RankSystemRecord {
    fn id(&self) -> RecordId {
        self.id
    }

    fn owner(&self) -> &str {
        &self.owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_serialization_hides_query_password() {
        let server = ManagedServer {
            id: 1,
            name: "main".into(),
            owner: "alice".into(),
            query: QueryEndpoint {
                host: "10.0.0.2".into(),
                port: 10011,
                username: "serveradmin".into(),
                password: "secret".into(),
            },
            voice_port: 9987,
            slots: 32,
        };
        let json = serde_json::to_string(&server).expect("serialize");
        assert!(!json.contains("secret"));
        assert!(json.contains("voicePort"));
    }
}
