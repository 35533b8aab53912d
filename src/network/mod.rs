//! Network module.
//!
//! Contains the Gateway (TCP and WebSocket listeners), the per-client
//! Connection handler and the frame transport they share.

mod connection;
mod gateway;
pub mod transport;

pub use connection::Connection;
pub use gateway::Gateway;
pub use transport::{FrameError, FrameTransport};
