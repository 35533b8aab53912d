//! voxfleetd - real-time control plane daemon for a fleet of voice servers.

use std::sync::Arc;
use tracing::{error, info};
use voxfleet::config::Config;
use voxfleet::network::Gateway;
use voxfleet::{AppContext, Collaborators};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            // Logging is configured from the file, so report on stderr.
            eprintln!("voxfleetd: failed to load {config_path}: {e}");
            return Err(e.into());
        }
    };

    voxfleet::telemetry::init(&config.logging);
    info!(
        server = %config.server.name,
        servers = config.servers.len(),
        principals = config.principals.len(),
        "Starting voxfleetd"
    );

    voxfleet::metrics::init();

    let ctx = AppContext::new(&config, Collaborators::in_memory(&config));

    if let Some(port) = config.server.metrics_port {
        tokio::spawn(voxfleet::http::run_http_server(port, Arc::clone(&ctx)));
    }

    let gateway = Gateway::bind(Arc::clone(&ctx)).await.map_err(|e| {
        error!(error = %e, "Failed to bind listeners");
        e
    })?;

    tokio::select! {
        result = gateway.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            ctx.broadcaster.detach_all();
            Ok(())
        }
    }
}
