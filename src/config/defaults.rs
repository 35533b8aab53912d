//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use std::net::{IpAddr, Ipv4Addr};

// =============================================================================
// Listener Defaults
// =============================================================================

pub fn default_handshake_timeout() -> u64 {
    10
}

pub fn default_outbound_queue() -> usize {
    256
}

// =============================================================================
// Port Window Defaults
// =============================================================================

pub fn default_port_start() -> u16 {
    4000
}

pub fn default_port_end() -> u16 {
    8000
}

pub fn default_probe_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

// =============================================================================
// Query Session Defaults
// =============================================================================

pub fn default_display_label() -> String {
    "voxfleet".to_string()
}

/// Virtual server index selected after login.
pub fn default_virtual_server_id() -> u32 {
    1
}

pub fn default_request_timeout() -> u64 {
    10
}

// =============================================================================
// Cache / Logging Defaults
// =============================================================================

pub fn default_status_prefix() -> String {
    "status:".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}
