//! Integration test common infrastructure.
//!
//! Provides the spawned and in-process servers, a line-protocol client, and
//! scripted fakes for the query transport and port probe.

pub mod client;
pub mod fakes;
pub mod server;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use fakes::{FixedProbe, MockConnector, MockTransport, Script};
#[allow(unused_imports)]
pub use server::{TestGateway, TestServer};

use std::time::Duration;

/// Poll `condition` until it holds or two seconds pass.
#[allow(dead_code)]
pub async fn eventually<F: FnMut() -> bool>(mut condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
