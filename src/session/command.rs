//! Client commands forwarded through an administrative session.

use serde_json::Value;
use voxfleet_proto::{ClientEvent, ClientRequest, QueryCommand, normalize};

/// A client request that maps 1:1 onto one query request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Kick {
        clid: u64,
    },
    Ban {
        clid: u64,
        time: Option<u64>,
        reason: Option<String>,
    },
    ServerGroupAdd {
        sgid: u64,
        cldbid: u64,
    },
    ServerGroupRemove {
        sgid: u64,
        cldbid: u64,
    },
    ServerGroupList,
    ChannelList,
}

impl AdminCommand {
    /// Extract the forwarded command from a request, if it is one.
    pub fn from_request(request: &ClientRequest) -> Option<Self> {
        let cmd = match request {
            ClientRequest::Kick { clid } => Self::Kick { clid: *clid },
            ClientRequest::Ban {
                clid,
                ban_time,
                ban_reason,
            } => Self::Ban {
                clid: *clid,
                time: *ban_time,
                reason: ban_reason.clone(),
            },
            ClientRequest::ServerGroupAdd { sgid, cldbid } => Self::ServerGroupAdd {
                sgid: *sgid,
                cldbid: *cldbid,
            },
            ClientRequest::ServerGroupRemove { sgid, cldbid } => Self::ServerGroupRemove {
                sgid: *sgid,
                cldbid: *cldbid,
            },
            ClientRequest::GetServerGroupList => Self::ServerGroupList,
            ClientRequest::GetChannelList => Self::ChannelList,
            _ => return None,
        };
        Some(cmd)
    }

    /// Client-facing request name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Kick { .. } => "kick",
            Self::Ban { .. } => "ban",
            Self::ServerGroupAdd { .. } => "serverGroupAdd",
            Self::ServerGroupRemove { .. } => "serverGroupRemove",
            Self::ServerGroupList => "getServerGroupList",
            Self::ChannelList => "getChannelList",
        }
    }

    pub fn to_query(&self) -> QueryCommand {
        match self {
            Self::Kick { clid } => QueryCommand::ClientKick {
                clid: *clid,
                message: None,
            },
            Self::Ban { clid, time, reason } => QueryCommand::BanClient {
                clid: *clid,
                time: *time,
                reason: reason.clone(),
            },
            Self::ServerGroupAdd { sgid, cldbid } => QueryCommand::ServerGroupAddClient {
                sgid: *sgid,
                cldbid: *cldbid,
            },
            Self::ServerGroupRemove { sgid, cldbid } => QueryCommand::ServerGroupDelClient {
                sgid: *sgid,
                cldbid: *cldbid,
            },
            Self::ServerGroupList => QueryCommand::ServerGroupList,
            Self::ChannelList => QueryCommand::ChannelList,
        }
    }

    /// Reply for the requester. Only the list commands answer.
    pub fn reply(&self, raw: Value) -> Option<ClientEvent> {
        match self {
            Self::ServerGroupList => Some(ClientEvent::ServerGroupList {
                groups: normalize(raw),
            }),
            Self::ChannelList => Some(ClientEvent::ChannelList {
                channels: normalize(raw),
            }),
            _ => None,
        }
    }
}
