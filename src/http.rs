//! HTTP side listener: Prometheus `/metrics` and a `/healthz` probe.
//!
//! Runs on its own tokio task, only when `server.metrics_port` is set.

use crate::context::AppContext;
use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use voxfleet_proto::Feature;

/// GET /metrics - Prometheus text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// GET /healthz - live counts, for orchestration probes.
async fn health_handler(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let features: serde_json::Map<String, Value> = Feature::ALL
        .iter()
        .map(|f| (f.to_string(), json!(ctx.feature(*f).active_count())))
        .collect();
    Json(json!({
        "name": ctx.server_name,
        "sessions": ctx.sessions.len(),
        "rooms": ctx.rooms.room_count(),
        "status_listeners": ctx.broadcaster.listener_count(),
        "features": features,
    }))
}

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_handler))
        .with_state(ctx)
}

/// Serve [`router`] on `0.0.0.0:port` until the process exits.
pub async fn run_http_server(port: u16, ctx: Arc<AppContext>) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind HTTP server");
            return;
        }
    };
    tracing::info!(%addr, "HTTP server listening");

    if let Err(e) = axum::serve(listener, router(ctx)).await {
        tracing::error!(error = %e, "HTTP server error");
    }
}
