//! # voxfleet-proto
//!
//! Wire types shared by the voxfleet daemon and its clients, plus the seams
//! through which the daemon talks to a voice server's administrative query
//! interface.
//!
//! The crate deliberately stops at the trait boundary for the query protocol:
//! byte-level encoding lives in whichever transport implementation is plugged
//! in behind [`QueryConnector`].
//!
//! ## Quick Start
//!
//! ```rust
//! use voxfleet_proto::{normalize, ClientRequest};
//! use serde_json::json;
//!
//! let rows = normalize(json!({ "clid": [1, 2], "cid": 5 }));
//! assert_eq!(rows.len(), 2);
//!
//! let req: ClientRequest = serde_json::from_str(r#"{"event":"list_servers"}"#).unwrap();
//! assert_eq!(req, ClientRequest::ListServers);
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod command;
pub mod error;
pub mod event;
pub mod model;
pub mod record;
pub mod transport;

pub use command::{NotifyKind, Notification, QueryCommand};
pub use error::TransportError;
pub use event::{ClientEvent, ClientRequest, Feature, StatusUpdate};
pub use model::{BotRecord, ManagedServer, OwnedRecord, RankSystemRecord, RecordId};
pub use record::{normalize, ClientRecord, ClientType, Record};
pub use transport::{
    EventSubscription, QueryConnector, QueryEndpoint, QueryTransport, SubscriptionId,
    UnavailableConnector,
};
