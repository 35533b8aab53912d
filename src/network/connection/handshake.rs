use crate::auth::Principal;
use crate::context::AppContext;
use crate::error::RequestError;
use crate::network::transport::{FrameError, FrameTransport};
use tracing::{debug, warn};
use voxfleet_proto::{ClientEvent, ClientRequest};

/// Why a connection never got past `hello`.
#[derive(Debug)]
pub enum HandshakeExit {
    /// No `hello` within the handshake timeout.
    TimedOut,
    /// Peer closed before identifying.
    Disconnected,
    /// Rejected with an `error` frame.
    Rejected(RequestError),
    /// Transport failure.
    Transport(FrameError),
}

/// Wait for the identifying `hello` frame and authenticate it.
pub async fn await_hello(
    transport: &mut FrameTransport,
    ctx: &AppContext,
) -> Result<Principal, HandshakeExit> {
    let timeout = ctx.listen.handshake_timeout();
    let frame = match tokio::time::timeout(timeout, next_non_empty(transport)).await {
        Err(_) => return Err(HandshakeExit::TimedOut),
        Ok(None) => return Err(HandshakeExit::Disconnected),
        Ok(Some(Err(e))) => return Err(HandshakeExit::Transport(e)),
        Ok(Some(Ok(frame))) => frame,
    };

    let outcome = match serde_json::from_str::<ClientRequest>(&frame) {
        Ok(ClientRequest::Hello { token }) => ctx
            .auth
            .authenticate(&token)
            .ok_or(RequestError::AuthFailed),
        Ok(other) => {
            debug!(request = other.name(), "request before hello");
            Err(RequestError::NotIdentified)
        }
        Err(e) => Err(RequestError::InvalidFrame(e.to_string())),
    };

    match outcome {
        Ok(principal) => Ok(principal),
        Err(err) => {
            warn!(code = err.error_code(), "handshake rejected");
            crate::metrics::record_request_error("hello", err.error_code());
            if let Some(reply) = err.to_event() {
                send_rejection(transport, &reply).await;
            }
            Err(HandshakeExit::Rejected(err))
        }
    }
}

async fn next_non_empty(transport: &mut FrameTransport) -> Option<Result<String, FrameError>> {
    loop {
        match transport.next_frame().await? {
            Ok(frame) if frame.trim().is_empty() => continue,
            other => return Some(other),
        }
    }
}

async fn send_rejection(transport: &mut FrameTransport, reply: &ClientEvent) {
    match serde_json::to_string(reply) {
        Ok(json) => {
            if let Err(e) = transport.send_frame(json).await {
                debug!(error = %e, "failed to deliver handshake rejection");
            }
        }
        Err(e) => warn!(error = %e, "failed to encode handshake rejection"),
    }
}
