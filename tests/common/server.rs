//! Test server management.
//!
//! `TestServer` spawns the real `voxfleetd` binary against a temporary config.
//! `TestGateway` runs the gateway in-process with scripted collaborators, for
//! tests that need to drive the status cache or the query transport.

#![allow(dead_code)]

use super::client::TestClient;
use super::fakes::{FixedProbe, MockConnector};
use std::net::SocketAddr;
use std::process::{Child, Command};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use voxfleet::cache::MemoryCache;
use voxfleet::config::Config;
use voxfleet::network::Gateway;
use voxfleet::ports::PortProbe;
use voxfleet::store::MemoryStore;
use voxfleet::{AppContext, Collaborators};

/// Fleet used by most tests: alice owns server 1 and bot 10, bob owns
/// server 2 and rank system 20, root is an admin, carol may only see bots.
pub const FLEET: &str = r#"
[[principals]]
token = "alice-token"
user = "alice"
scope = "owner"

[[principals]]
token = "bob-token"
user = "bob"
scope = "owner"

[[principals]]
token = "root-token"
user = "root"
scope = "admin"

[[principals]]
token = "carol-token"
user = "carol"
scope = "owner"
features = ["bot"]

[[servers]]
id = 1
name = "Alpha"
owner = "alice"
host = "10.0.0.1"
query_port = 10011
query_username = "serveradmin"
query_password = "alpha-secret"
voice_port = 9987
slots = 32

[[servers]]
id = 2
name = "Bravo"
owner = "bob"
host = "10.0.0.2"
query_port = 10011
query_username = "serveradmin"
query_password = "bravo-secret"
voice_port = 9988
slots = 16

[[bots]]
id = 10
name = "musicbot"
owner = "alice"
server_id = 1

[[rank_systems]]
id = 20
name = "ranks"
owner = "bob"
server_id = 2
"#;

/// Pick a port that is free right now.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("no free port")
}

/// A spawned `voxfleetd` process.
pub struct TestServer {
    child: Child,
    port: u16,
    _dir: TempDir,
}

impl TestServer {
    /// Spawn the daemon with [`FLEET`] plus `extra` TOML appended.
    pub async fn spawn(extra: &str) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let port = free_port();
        let config = format!(
            r#"
[server]
name = "test.fleet"

[listen]
address = "127.0.0.1:{port}"
handshake_timeout = 1

[logging]
level = "warn"
{FLEET}
{extra}
"#
        );
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, config)?;

        let child = Command::new(env!("CARGO_BIN_EXE_voxfleetd"))
            .arg(&config_path)
            .spawn()?;

        let server = Self {
            child,
            port,
            _dir: dir,
        };
        server.wait_until_ready().await?;
        Ok(server)
    }

    /// Wait until the daemon is accepting connections.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port))
                .await
                .is_ok()
            {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("voxfleetd failed to start within 5 seconds")
    }

    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    pub async fn connect(&self) -> anyhow::Result<TestClient> {
        TestClient::connect(&self.address()).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// In-process gateway with scripted collaborators.
pub struct TestGateway {
    pub ctx: Arc<AppContext>,
    pub cache: Arc<MemoryCache>,
    pub store: Arc<MemoryStore>,
    pub connector: Arc<MockConnector>,
    addr: SocketAddr,
    task: JoinHandle<anyhow::Result<()>>,
}

impl TestGateway {
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(MockConnector::new(), FixedProbe::new([]), "").await
    }

    pub async fn start_with(
        connector: Arc<MockConnector>,
        probe: Arc<dyn PortProbe>,
        extra: &str,
    ) -> anyhow::Result<Self> {
        let config = Config::parse(&format!(
            r#"
[server]
name = "test.fleet"

[listen]
address = "127.0.0.1:0"
handshake_timeout = 1
# Small so a backed-up room queue shows up in tests.
outbound_queue = 4

[ports]
start = 41000
end = 41004

[query]
request_timeout = 2
{FLEET}
{extra}
"#
        ))?;

        let store = Arc::new(MemoryStore::from_config(&config));
        let cache = Arc::new(MemoryCache::new());
        let collaborators = Collaborators {
            store: store.clone(),
            used_ports: store.clone(),
            cache: cache.clone(),
            connector: connector.clone(),
            probe,
        };
        let ctx = AppContext::new(&config, collaborators);

        let gateway = Gateway::bind(Arc::clone(&ctx)).await?;
        let addr = gateway.local_addr()?;
        let task = tokio::spawn(gateway.run());

        Ok(Self {
            ctx,
            cache,
            store,
            connector,
            addr,
            task,
        })
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub async fn connect(&self) -> anyhow::Result<TestClient> {
        TestClient::connect(&self.address()).await
    }

    /// Connect and identify with `token`.
    pub async fn login(&self, token: &str) -> anyhow::Result<TestClient> {
        let mut client = self.connect().await?;
        client.hello(token).await?;
        Ok(client)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.task.abort();
    }
}
