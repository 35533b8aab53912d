//! Connection - Handles an individual client connection.
//!
//! Each Connection runs in its own Tokio task:
//!
//! ```text
//! Phase 1: Handshake (first frame must be hello{token}, bounded by timeout)
//!    |
//! Phase 2: Event loop (tokio::select!)
//!    +---------------------------------------------------+
//!    |   inbound frames  ---> dispatch ---> direct reply |
//!    |   outbound queues ---> session / room events      |
//!    +---------------------------------------------------+
//!    |
//! Phase 3: Cleanup (session teardown, feature + room removal)
//! ```
//!
//! Cleanup runs on every exit path of phase 2, so the owner's disconnect is
//! what cancels its administrative session.

mod dispatch;
mod handshake;

use crate::context::AppContext;
use crate::ids::ConnectionId;
use crate::network::transport::{FrameError, FrameTransport};
use crate::rooms::{ConnectionHandle, Outbound};
use futures_util::future::OptionFuture;
use handshake::HandshakeExit;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};
use voxfleet_proto::ClientEvent;

type PendingReply = Pin<Box<dyn Future<Output = Option<ClientEvent>> + Send>>;

/// A client connection handler.
pub struct Connection {
    id: ConnectionId,
    addr: SocketAddr,
    transport: FrameTransport,
    ctx: Arc<AppContext>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        addr: SocketAddr,
        transport: FrameTransport,
        ctx: Arc<AppContext>,
    ) -> Self {
        Self {
            id,
            addr,
            transport,
            ctx,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Run the connection until the peer goes away.
    pub async fn run(mut self) -> Result<(), FrameError> {
        let principal = match handshake::await_hello(&mut self.transport, &self.ctx).await {
            Ok(principal) => principal,
            Err(HandshakeExit::Transport(e)) => return Err(e),
            Err(exit) => {
                debug!(addr = %self.addr, ?exit, "handshake ended");
                self.transport.close().await;
                return Ok(());
            }
        };

        let (handle, mut outbound) =
            ConnectionHandle::channel(self.id, self.ctx.listen.outbound_queue);
        let features = self.ctx.admit(&handle, &principal);
        crate::metrics::client_connected();
        info!(user = %principal.user, scope = ?principal.scope, ?features, "client identified");

        let welcome = ClientEvent::Welcome {
            connection: self.id.to_string(),
            user: principal.user.clone(),
            features,
        };
        let result = match self.send_event(&welcome).await {
            Ok(()) => self.event_loop(&handle, &mut outbound).await,
            Err(e) => Err(e),
        };

        self.ctx.disconnect(self.id).await;
        crate::metrics::client_disconnected();
        self.transport.close().await;
        result
    }

    /// One request is handled at a time. While it is in flight, inbound reads
    /// pause but queued events keep flowing to the peer.
    async fn event_loop(
        &mut self,
        handle: &ConnectionHandle,
        outbound: &mut Outbound,
    ) -> Result<(), FrameError> {
        let mut in_flight: Option<PendingReply> = None;
        loop {
            tokio::select! {
                reply = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                    in_flight = None;
                    if let Some(Some(reply)) = reply {
                        self.send_event(&reply).await?;
                    }
                }
                frame = self.transport.next_frame(), if in_flight.is_none() => match frame {
                    Some(Ok(frame)) => {
                        if frame.trim().is_empty() {
                            continue;
                        }
                        let ctx = Arc::clone(&self.ctx);
                        let handle = handle.clone();
                        in_flight = Some(Box::pin(async move {
                            dispatch::handle_frame(&ctx, &handle, &frame).await
                        }));
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        debug!("peer closed connection");
                        return Ok(());
                    }
                },
                Some(event) = outbound.recv() => self.send_event(&event).await?,
            }
        }
    }

    async fn send_event(&mut self, event: &ClientEvent) -> Result<(), FrameError> {
        match serde_json::to_string(event) {
            Ok(json) => self.transport.send_frame(json).await,
            Err(e) => {
                warn!(event = event.name(), error = %e, "failed to encode event");
                Ok(())
            }
        }
    }
}
