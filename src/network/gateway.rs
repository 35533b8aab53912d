//! Gateway - TCP listeners that accept incoming client connections.
//!
//! The Gateway binds the line-protocol listener and, when configured, the
//! WebSocket listener, and spawns a Connection task per accepted client.

use crate::config::WebSocketConfig;
use crate::context::AppContext;
use crate::ids::ConnectionId;
use crate::network::Connection;
use crate::network::transport::FrameTransport;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tracing::{Instrument, error, info, instrument, warn};

/// The Gateway accepts incoming connections and spawns handlers.
pub struct Gateway {
    lines_listener: TcpListener,
    websocket_listener: Option<(TcpListener, WebSocketConfig)>,
    ctx: Arc<AppContext>,
}

impl Gateway {
    /// Bind the listeners named in `ctx.listen`.
    pub async fn bind(ctx: Arc<AppContext>) -> anyhow::Result<Self> {
        let lines_listener = TcpListener::bind(ctx.listen.address).await?;
        info!(address = %lines_listener.local_addr()?, "Line listener bound");

        let websocket_listener = match ctx.listen.websocket.clone() {
            Some(ws_cfg) => {
                let listener = TcpListener::bind(ws_cfg.address).await?;
                info!(address = %listener.local_addr()?, "WebSocket listener bound");
                Some((listener, ws_cfg))
            }
            None => None,
        };

        Ok(Self {
            lines_listener,
            websocket_listener,
            ctx,
        })
    }

    /// Address of the line-protocol listener.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.lines_listener.local_addr()
    }

    /// Address of the WebSocket listener, if one is bound.
    pub fn websocket_addr(&self) -> Option<std::io::Result<SocketAddr>> {
        self.websocket_listener
            .as_ref()
            .map(|(listener, _)| listener.local_addr())
    }

    /// Run the gateway, accepting connections forever.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        if let Some((ws_listener, ws_config)) = self.websocket_listener {
            let ctx = Arc::clone(&self.ctx);
            tokio::spawn(
                async move {
                    loop {
                        match ws_listener.accept().await {
                            Ok((stream, addr)) => {
                                info!(%addr, "WebSocket connection attempt");
                                let ctx = Arc::clone(&ctx);
                                let allowed = ws_config.allow_origins.clone();
                                tokio::spawn(accept_websocket(stream, addr, allowed, ctx));
                            }
                            Err(e) => {
                                error!(error = %e, "Failed to accept WebSocket connection");
                            }
                        }
                    }
                }
                .in_current_span(),
            );
        }

        loop {
            match self.lines_listener.accept().await {
                Ok((stream, addr)) => {
                    info!(%addr, "Line connection accepted");
                    spawn_connection(FrameTransport::lines(stream), addr, Arc::clone(&self.ctx));
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

async fn accept_websocket(
    stream: TcpStream,
    addr: SocketAddr,
    allowed: Vec<String>,
    ctx: Arc<AppContext>,
) {
    // Empty allow list admits every origin.
    let cors_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if allowed.is_empty() {
            return Ok(response);
        }
        if let Some(origin) = req.headers().get("Origin").and_then(|o| o.to_str().ok()) {
            if allowed.iter().any(|a| a == origin || a == "*") {
                return Ok(response);
            }
            warn!(%addr, origin = %origin, "WebSocket CORS rejected");
        }
        let mut rejection = ErrorResponse::new(Some("CORS origin not allowed".to_string()));
        *rejection.status_mut() = http::StatusCode::FORBIDDEN;
        Err(rejection)
    };

    match accept_hdr_async(stream, cors_callback).await {
        Ok(ws_stream) => {
            info!(%addr, "WebSocket handshake successful");
            spawn_connection(FrameTransport::websocket(ws_stream), addr, ctx);
        }
        Err(e) => {
            warn!(%addr, error = %e, "WebSocket handshake failed");
        }
    }
}

fn spawn_connection(transport: FrameTransport, addr: SocketAddr, ctx: Arc<AppContext>) {
    let id = ConnectionId::new();
    let span = crate::telemetry::spans::connection(id, addr, transport.kind());
    let connection = Connection::new(id, addr, transport, ctx);
    tokio::spawn(
        async move {
            if let Err(e) = connection.run().await {
                warn!(error = %e, "connection error");
            }
            info!("connection closed");
        }
        .instrument(span),
    );
}
