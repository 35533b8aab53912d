//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::collections::HashSet;
use thiserror::Error;
use voxfleet_proto::RecordId;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("ports window {start}-{end} is empty or starts at 0")]
    EmptyPortWindow { start: u16, end: u16 },
    #[error("query.virtual_server_id must be at least 1")]
    InvalidVirtualServerId,
    #[error("query.request_timeout must be greater than 0")]
    ZeroRequestTimeout,
    #[error("listen.handshake_timeout must be greater than 0")]
    ZeroHandshakeTimeout,
    #[error("listen.outbound_queue must be greater than 0")]
    ZeroOutboundQueue,
    #[error("cache.status_prefix must not be empty")]
    EmptyStatusPrefix,
    #[error("principal for user '{0}' has an empty token")]
    EmptyToken(String),
    #[error("principal for user '{0}' reuses another principal's token")]
    DuplicateToken(String),
    #[error("duplicate server id {0}")]
    DuplicateServerId(RecordId),
    #[error("{kind} {id} references unknown server {server_id}")]
    UnknownServerRef {
        kind: &'static str,
        id: RecordId,
        server_id: RecordId,
    },
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.trim().is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    let ports = &config.ports;
    if ports.start == 0 || ports.start > ports.end {
        errors.push(ValidationError::EmptyPortWindow {
            start: ports.start,
            end: ports.end,
        });
    }

    if config.query.virtual_server_id == 0 {
        errors.push(ValidationError::InvalidVirtualServerId);
    }
    if config.query.request_timeout == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }
    if config.listen.handshake_timeout == 0 {
        errors.push(ValidationError::ZeroHandshakeTimeout);
    }
    if config.listen.outbound_queue == 0 {
        errors.push(ValidationError::ZeroOutboundQueue);
    }
    if config.cache.status_prefix.is_empty() {
        errors.push(ValidationError::EmptyStatusPrefix);
    }

    let mut tokens = HashSet::new();
    for principal in &config.principals {
        if principal.token.is_empty() {
            errors.push(ValidationError::EmptyToken(principal.user.clone()));
        } else if !tokens.insert(principal.token.as_str()) {
            errors.push(ValidationError::DuplicateToken(principal.user.clone()));
        }
    }

    let mut server_ids = HashSet::new();
    for server in &config.servers {
        if !server_ids.insert(server.id) {
            errors.push(ValidationError::DuplicateServerId(server.id));
        }
    }
    for bot in &config.bots {
        if !server_ids.contains(&bot.server_id) {
            errors.push(ValidationError::UnknownServerRef {
                kind: "bot",
                id: bot.id,
                server_id: bot.server_id,
            });
        }
    }
    for rank in &config.rank_systems {
        if !server_ids.contains(&rank.server_id) {
            errors.push(ValidationError::UnknownServerRef {
                kind: "rank system",
                id: rank.id,
                server_id: rank.server_id,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_unchecked(toml: &str) -> Config {
        toml::from_str(toml).unwrap()
    }

    fn minimal_valid_config() -> String {
        r#"
[server]
name = "fleet-test"

[listen]
address = "127.0.0.1:7400"

[[principals]]
token = "t-alice"
user = "alice"
scope = "owner"

[[servers]]
id = 1
name = "main"
owner = "alice"
host = "10.0.0.2"
query_port = 10011
query_username = "serveradmin"
query_password = "secret"
voice_port = 9987

[[bots]]
id = 7
name = "music"
owner = "alice"
server_id = 1
"#
        .to_string()
    }

    #[test]
    fn test_valid_config_passes() {
        let config = parse_unchecked(&minimal_valid_config());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_duplicate_tokens_fail() {
        let toml = minimal_valid_config()
            + r#"
[[principals]]
token = "t-alice"
user = "mallory"
scope = "admin"
"#;
        let errors = validate(&parse_unchecked(&toml)).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::DuplicateToken(u) if u == "mallory"))
        );
    }

    #[test]
    fn test_dangling_bot_fails() {
        let toml = minimal_valid_config()
            + r#"
[[bots]]
id = 8
name = "orphan"
owner = "alice"
server_id = 99
"#;
        let errors = validate(&parse_unchecked(&toml)).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::UnknownServerRef { server_id: 99, .. }
        )));
    }

    #[test]
    fn test_zero_virtual_server_fails() {
        let toml = minimal_valid_config() + "\n[query]\nvirtual_server_id = 0\n";
        let errors = validate(&parse_unchecked(&toml)).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::InvalidVirtualServerId))
        );
    }
}
