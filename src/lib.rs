//! voxfleet - real-time control plane for a fleet of voice servers.
//!
//! Client connections authenticate with a token, join tenant-scoped rooms,
//! and may open one administrative query session per connection against a
//! server they are allowed to manage. Status-cache changes are fanned out to
//! the rooms of the affected server.
//!
//! The daemon binary (`voxfleetd`) wires everything to in-memory
//! collaborators. Embedders build an [`AppContext`] from their own
//! [`Collaborators`] to plug in a real record store, cache or query transport.

pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod ids;
pub mod metrics;
pub mod network;
pub mod ports;
pub mod rooms;
pub mod session;
pub mod status;
pub mod store;
pub mod telemetry;

pub use context::{AppContext, Collaborators};
pub use ids::ConnectionId;
