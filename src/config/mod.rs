//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions and loading (Config, ServerConfig, ...)
//! - [`listen`]: Client listener configuration (ListenConfig, WebSocketConfig)
//! - [`fleet`]: Principals and seed records for the in-memory collaborators
//! - [`defaults`]: serde default functions
//! - [`validation`]: startup validation

mod defaults;
mod fleet;
mod listen;
mod types;
pub mod validation;

pub use fleet::{BotSeed, PrincipalConfig, RankSystemSeed, ServerSeed, StatusSeed};
pub use listen::{ListenConfig, WebSocketConfig};
pub use types::{
    CacheConfig, Config, ConfigError, LogFormat, LoggingConfig, PortsConfig, QueryConfig,
    ServerConfig,
};
pub use validation::ValidationError;
