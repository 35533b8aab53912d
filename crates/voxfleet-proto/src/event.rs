//! Client-facing frames.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.
//! Requests flow from clients to the daemon ([`ClientRequest`]); events flow
//! back ([`ClientEvent`]). Both are closed sets, so anything that does not
//! match a known variant is rejected at the connection boundary.

use crate::model::{BotRecord, ManagedServer, RankSystemRecord, RecordId};
use crate::record::ClientRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Feature areas a connection can be admitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    /// Server management (status, sessions).
    Server,
    /// Bot management.
    Bot,
    /// Rank systems.
    Rank,
}

impl Feature {
    /// All feature areas.
    pub const ALL: [Feature; 3] = [Feature::Server, Feature::Bot, Feature::Rank];

    /// Short name, also the room-name stem.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Bot => "bot",
            Self::Rank => "rank",
        }
    }

    /// Prefix shared by every room of this feature.
    pub fn room_prefix(&self) -> String {
        format!("{}-", self.as_str())
    }

    /// Room for one record: `<feature>-<id>`.
    pub fn room(&self, key: impl fmt::Display) -> String {
        format!("{}-{}", self.as_str(), key)
    }

    /// Room keyed by the caller's identity: `<feature>-owner-<user>`.
    ///
    /// Kept apart from record rooms so a numeric user name can never alias
    /// a record's room.
    pub fn owner_room(&self, user: &str) -> String {
        format!("{}-owner-{}", self.as_str(), user)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frames sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientRequest {
    /// First frame of every connection.
    #[serde(rename = "hello")]
    Hello {
        /// Access token.
        token: String,
    },
    /// List servers visible to the caller and join their rooms.
    #[serde(rename = "list_servers")]
    ListServers,
    /// List bots visible to the caller and join their rooms.
    #[serde(rename = "list_bots")]
    ListBots,
    /// List rank systems visible to the caller and join their rooms.
    #[serde(rename = "list_rank_systems")]
    ListRankSystems,
    /// Open (or replace) this connection's administrative session.
    #[serde(rename = "manage_server", rename_all = "camelCase")]
    ManageServer {
        /// Target server.
        server_id: RecordId,
    },
    /// Kick a client.
    #[serde(rename = "kick")]
    Kick {
        /// Target client id.
        clid: u64,
    },
    /// Ban a client.
    #[serde(rename = "ban", rename_all = "camelCase")]
    Ban {
        /// Target client id.
        clid: u64,
        /// Duration in seconds; absent for permanent.
        #[serde(default)]
        ban_time: Option<u64>,
        /// Reason shown to the client.
        #[serde(default)]
        ban_reason: Option<String>,
    },
    /// Add a client to a server group.
    #[serde(rename = "serverGroupAdd")]
    ServerGroupAdd {
        /// Server group id.
        sgid: u64,
        /// Client database id.
        cldbid: u64,
    },
    /// Remove a client from a server group.
    #[serde(rename = "serverGroupRemove")]
    ServerGroupRemove {
        /// Server group id.
        sgid: u64,
        /// Client database id.
        cldbid: u64,
    },
    /// Fetch the server group list through the session.
    #[serde(rename = "getServerGroupList")]
    GetServerGroupList,
    /// Fetch the channel list through the session.
    #[serde(rename = "getChannelList")]
    GetChannelList,
    /// Reserve a free port for a new server instance.
    #[serde(rename = "reserve_port")]
    ReservePort,
}

impl ClientRequest {
    /// Wire name of the request, for logging and error replies.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "hello",
            Self::ListServers => "list_servers",
            Self::ListBots => "list_bots",
            Self::ListRankSystems => "list_rank_systems",
            Self::ManageServer { .. } => "manage_server",
            Self::Kick { .. } => "kick",
            Self::Ban { .. } => "ban",
            Self::ServerGroupAdd { .. } => "serverGroupAdd",
            Self::ServerGroupRemove { .. } => "serverGroupRemove",
            Self::GetServerGroupList => "getServerGroupList",
            Self::GetChannelList => "getChannelList",
            Self::ReservePort => "reserve_port",
        }
    }
}

/// Payload of `serverStatusUpdated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    /// Server whose status changed.
    pub server_id: RecordId,
    /// Current status.
    pub status: String,
    /// Current online count.
    pub onlines: u32,
    /// Status before the change, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<String>,
    /// Online count before the change, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_onlines: Option<u32>,
}

/// Frames sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Handshake accepted.
    #[serde(rename = "welcome")]
    Welcome {
        /// Opaque connection token.
        connection: String,
        /// Authenticated user.
        user: String,
        /// Feature areas the connection was admitted to.
        features: Vec<Feature>,
    },
    /// The administrative session could not be established or was lost.
    #[serde(rename = "bot_connection_error", rename_all = "camelCase")]
    BotConnectionError {
        /// Target server.
        server_id: RecordId,
        /// Human-readable cause.
        message: String,
    },
    /// The administrative session is ready for commands.
    #[serde(rename = "session_ready", rename_all = "camelCase")]
    SessionReady {
        /// Target server.
        server_id: RecordId,
    },
    /// Full presence snapshot.
    #[serde(rename = "online_clients", rename_all = "camelCase")]
    OnlineClients {
        /// Target server.
        server_id: RecordId,
        /// Voice clients currently online.
        clients: Vec<ClientRecord>,
    },
    /// A voice client came online.
    #[serde(rename = "client_entered")]
    ClientEntered(ClientRecord),
    /// A voice client went offline (last known record).
    #[serde(rename = "client_left")]
    ClientLeft(ClientRecord),
    /// A server's cached status changed.
    #[serde(rename = "serverStatusUpdated")]
    ServerStatusUpdated(StatusUpdate),
    /// Reply to `list_servers`.
    #[serde(rename = "server_list")]
    ServerList {
        /// Servers visible to the caller.
        servers: Vec<ManagedServer>,
    },
    /// Reply to `list_bots`.
    #[serde(rename = "bot_list")]
    BotList {
        /// Bots visible to the caller.
        bots: Vec<BotRecord>,
    },
    /// Reply to `list_rank_systems`.
    #[serde(rename = "rank_system_list", rename_all = "camelCase")]
    RankSystemList {
        /// Rank systems visible to the caller.
        rank_systems: Vec<RankSystemRecord>,
    },
    /// Reply to `getServerGroupList`.
    #[serde(rename = "server_group_list")]
    ServerGroupList {
        /// Normalized server group rows.
        groups: Vec<Value>,
    },
    /// Reply to `getChannelList`.
    #[serde(rename = "channel_list")]
    ChannelList {
        /// Normalized channel rows.
        channels: Vec<Value>,
    },
    /// Reply to `reserve_port`.
    #[serde(rename = "port_reserved")]
    PortReserved {
        /// Claimed port.
        port: u16,
    },
    /// A forwarded administrative command failed; the session stays up.
    #[serde(rename = "command_failed")]
    CommandFailed {
        /// Request name.
        command: String,
        /// Stable error code.
        code: String,
        /// Human-readable cause.
        message: String,
    },
    /// A request was rejected.
    #[serde(rename = "error")]
    Error {
        /// Stable error code.
        code: String,
        /// Human-readable cause.
        message: String,
    },
}

impl ClientEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::BotConnectionError { .. } => "bot_connection_error",
            Self::SessionReady { .. } => "session_ready",
            Self::OnlineClients { .. } => "online_clients",
            Self::ClientEntered(_) => "client_entered",
            Self::ClientLeft(_) => "client_left",
            Self::ServerStatusUpdated(_) => "serverStatusUpdated",
            Self::ServerList { .. } => "server_list",
            Self::BotList { .. } => "bot_list",
            Self::RankSystemList { .. } => "rank_system_list",
            Self::ServerGroupList { .. } => "server_group_list",
            Self::ChannelList { .. } => "channel_list",
            Self::PortReserved { .. } => "port_reserved",
            Self::CommandFailed { .. } => "command_failed",
            Self::Error { .. } => "error",
        }
    }

    /// Shorthand for an [`ClientEvent::Error`] frame.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}
