//! Collision-free port allocation for new server instances.
//!
//! A candidate is accepted only if the store does not list it as used (read
//! fresh for every check), a live bind probe succeeds, and the store's atomic
//! claim wins. The window is scanned in random order, so concurrent allocators
//! rarely race on the same candidate, and exhaustion is detected after one
//! pass.

use crate::config::PortsConfig;
use crate::error::{AllocError, StoreError};
use crate::store::UsedPortStore;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::net::IpAddr;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// OS-level check that a port can be bound right now.
#[async_trait]
pub trait PortProbe: Send + Sync {
    async fn is_free(&self, port: u16) -> bool;
}

/// Binds a TCP listener on the probe host and releases it immediately.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: IpAddr,
}

impl TcpProbe {
    pub fn new(host: IpAddr) -> Self {
        Self { host }
    }
}

#[async_trait]
impl PortProbe for TcpProbe {
    async fn is_free(&self, port: u16) -> bool {
        match TcpListener::bind((self.host, port)).await {
            Ok(listener) => {
                drop(listener);
                true
            }
            Err(e) => {
                debug!(port, error = %e, "port probe failed");
                false
            }
        }
    }
}

pub struct PortAllocator {
    window: RangeInclusive<u16>,
    store: Arc<dyn UsedPortStore>,
    probe: Arc<dyn PortProbe>,
}

impl PortAllocator {
    pub fn new(
        window: RangeInclusive<u16>,
        store: Arc<dyn UsedPortStore>,
        probe: Arc<dyn PortProbe>,
    ) -> Self {
        Self {
            window,
            store,
            probe,
        }
    }

    pub fn from_config(config: &PortsConfig, store: Arc<dyn UsedPortStore>) -> Self {
        Self::new(
            config.start..=config.end,
            store,
            Arc::new(TcpProbe::new(config.probe_host)),
        )
    }

    /// Find, verify and claim a free port.
    pub async fn allocate(&self) -> Result<u16, AllocError> {
        let result = self.try_allocate().await;
        match &result {
            Ok(port) => {
                info!(port, "port allocated");
                crate::metrics::record_port_allocation("allocated");
            }
            Err(e) => {
                warn!(error = %e, "port allocation failed");
                crate::metrics::record_port_allocation(e.error_code());
            }
        }
        result
    }

    async fn try_allocate(&self) -> Result<u16, AllocError> {
        let used = self.store.used_ports().await?;
        let mut candidates: Vec<u16> = self
            .window
            .clone()
            .filter(|port| !used.contains(port))
            .collect();
        candidates.shuffle(&mut rand::thread_rng());

        for port in candidates {
            if self.port_is_in_use(port).await? {
                continue;
            }
            if !self.probe.is_free(port).await {
                continue;
            }
            if self.store.claim_port(port).await? {
                return Ok(port);
            }
            debug!(port, "lost claim race");
        }

        Err(AllocError::NoAvailablePort {
            start: *self.window.start(),
            end: *self.window.end(),
        })
    }

    /// Whether the store currently lists `port` as used. Never cached.
    pub async fn port_is_in_use(&self, port: u16) -> Result<bool, StoreError> {
        self.store.is_port_used(port).await
    }

    /// Return a port to the pool.
    pub async fn release(&self, port: u16) -> Result<bool, StoreError> {
        let released = self.store.release_port(port).await?;
        if released {
            info!(port, "port released");
        }
        Ok(released)
    }
}
