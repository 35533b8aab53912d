//! Administrative query requests and server-pushed notifications.

use serde_json::Value;
use std::fmt;

/// A request sent over the query interface.
///
/// Transports encode these into whatever the wire format requires; the
/// [`name`](QueryCommand::name) and [`params`](QueryCommand::params) accessors
/// give the conventional command word and key/value arguments.
#[derive(Clone, PartialEq, Eq)]
pub enum QueryCommand {
    /// Authenticate the query connection.
    Login {
        /// Query login name.
        username: String,
        /// Query password.
        password: String,
    },
    /// Select the virtual server instance to operate on.
    Use {
        /// Virtual server index.
        sid: u32,
    },
    /// Turn the server-side command throttle on or off for this connection.
    SetThrottle {
        /// Whether throttling applies.
        enabled: bool,
    },
    /// Change the display name of this query connection.
    ClientUpdate {
        /// New display name.
        nickname: String,
    },
    /// Register for server-wide notifications (client enter/leave).
    ServerNotifyRegister,
    /// List connected clients.
    ClientList,
    /// Kick a client from the server.
    ClientKick {
        /// Target client id.
        clid: u64,
        /// Optional kick message.
        message: Option<String>,
    },
    /// Ban a client.
    BanClient {
        /// Target client id.
        clid: u64,
        /// Ban duration in seconds; `None` for permanent.
        time: Option<u64>,
        /// Ban reason shown to the client.
        reason: Option<String>,
    },
    /// Add a client database id to a server group.
    ServerGroupAddClient {
        /// Server group id.
        sgid: u64,
        /// Client database id.
        cldbid: u64,
    },
    /// Remove a client database id from a server group.
    ServerGroupDelClient {
        /// Server group id.
        sgid: u64,
        /// Client database id.
        cldbid: u64,
    },
    /// List server groups.
    ServerGroupList,
    /// List channels.
    ChannelList,
}

impl QueryCommand {
    /// Conventional command word.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::Use { .. } => "use",
            Self::SetThrottle { .. } => "throttle",
            Self::ClientUpdate { .. } => "clientupdate",
            Self::ServerNotifyRegister => "servernotifyregister",
            Self::ClientList => "clientlist",
            Self::ClientKick { .. } => "clientkick",
            Self::BanClient { .. } => "banclient",
            Self::ServerGroupAddClient { .. } => "servergroupaddclient",
            Self::ServerGroupDelClient { .. } => "servergroupdelclient",
            Self::ServerGroupList => "servergrouplist",
            Self::ChannelList => "channellist",
        }
    }

    /// Key/value arguments in protocol order.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Login { username, password } => vec![
                ("client_login_name", username.clone()),
                ("client_login_password", password.clone()),
            ],
            Self::Use { sid } => vec![("sid", sid.to_string())],
            Self::SetThrottle { enabled } => vec![("enabled", u8::from(*enabled).to_string())],
            Self::ClientUpdate { nickname } => vec![("client_nickname", nickname.clone())],
            Self::ServerNotifyRegister => vec![("event", "server".to_string())],
            Self::ClientList | Self::ServerGroupList | Self::ChannelList => Vec::new(),
            Self::ClientKick { clid, message } => {
                // reasonid 5 = kick from server
                let mut params = vec![("clid", clid.to_string()), ("reasonid", "5".to_string())];
                if let Some(msg) = message {
                    params.push(("reasonmsg", msg.clone()));
                }
                params
            }
            Self::BanClient { clid, time, reason } => {
                let mut params = vec![("clid", clid.to_string())];
                if let Some(time) = time {
                    params.push(("time", time.to_string()));
                }
                if let Some(reason) = reason {
                    params.push(("banreason", reason.clone()));
                }
                params
            }
            Self::ServerGroupAddClient { sgid, cldbid }
            | Self::ServerGroupDelClient { sgid, cldbid } => {
                vec![("sgid", sgid.to_string()), ("cldbid", cldbid.to_string())]
            }
        }
    }
}

impl fmt::Debug for QueryCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("QueryCommand");
        out.field("name", &self.name());
        for (key, value) in self.params() {
            if key == "client_login_password" {
                out.field(key, &"<redacted>");
            } else {
                out.field(key, &value);
            }
        }
        out.finish()
    }
}

/// Server-pushed notification kinds a session can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifyKind {
    /// A client connected to (or became visible on) the virtual server.
    ClientEnter,
    /// A client left the virtual server.
    ClientLeave,
}

/// A single notification delivered through an
/// [`EventSubscription`](crate::EventSubscription).
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Which event fired.
    pub kind: NotifyKind,
    /// Raw event payload, one record.
    pub payload: Value,
}
