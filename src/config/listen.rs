//! Client listener configuration.

use super::defaults::{default_handshake_timeout, default_outbound_queue};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// Client listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address for newline-delimited JSON clients (e.g., "0.0.0.0:7400").
    pub address: SocketAddr,
    /// Optional WebSocket listener.
    pub websocket: Option<WebSocketConfig>,
    /// Seconds a new connection has to send `hello`.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout: u64,
    /// Outbound events buffered per connection before new ones are dropped.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl ListenConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout)
    }
}

/// WebSocket listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Address to bind to for WebSocket (e.g., "0.0.0.0:7401").
    pub address: SocketAddr,
    /// Allowed origins for CORS (e.g., `["https://panel.example.com"]`).
    /// Empty list allows all origins.
    #[serde(default)]
    pub allow_origins: Vec<String>,
}
