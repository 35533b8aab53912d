//! Request dispatch for identified connections.
//!
//! Every request is gated on the handler kinds the connection has attached
//! in the owning feature. The return value is the direct reply, if any;
//! asynchronous results (session events, status updates) travel through the
//! connection's outbound queue instead.

use crate::auth::Principal;
use crate::context::AppContext;
use crate::error::{RequestError, SessionError};
use crate::ids::ConnectionId;
use crate::rooms::{ConnectionHandle, FeatureRegistry, HandlerKind};
use crate::session::AdminCommand;
use crate::telemetry::RequestTimer;
use tracing::{debug, info, warn};
use voxfleet_proto::{ClientEvent, ClientRequest, Feature, RecordId};

/// Parse and handle one frame.
pub async fn handle_frame(
    ctx: &AppContext,
    handle: &ConnectionHandle,
    frame: &str,
) -> Option<ClientEvent> {
    let request = match serde_json::from_str::<ClientRequest>(frame) {
        Ok(request) => request,
        Err(e) => {
            let err = RequestError::InvalidFrame(e.to_string());
            debug!(conn = %handle.id(), error = %err, "rejecting frame");
            crate::metrics::record_request_error("unknown", err.error_code());
            return err.to_event();
        }
    };

    let name = request.name();
    crate::metrics::record_request(name);
    let _timer = RequestTimer::new(name);

    match dispatch(ctx, handle, request).await {
        Ok(reply) => reply,
        Err(err) => {
            crate::metrics::record_request_error(name, err.error_code());
            match &err {
                RequestError::Registry(_) | RequestError::Store(_) => {
                    warn!(conn = %handle.id(), request = name, error = %err, "request failed");
                }
                _ => debug!(conn = %handle.id(), request = name, error = %err, "request rejected"),
            }
            err.to_event()
        }
    }
}

async fn dispatch(
    ctx: &AppContext,
    handle: &ConnectionHandle,
    request: ClientRequest,
) -> Result<Option<ClientEvent>, RequestError> {
    let id = handle.id();
    match request {
        ClientRequest::Hello { .. } => Err(RequestError::AlreadyIdentified),
        ClientRequest::ListServers => list_servers(ctx, id).await.map(Some),
        ClientRequest::ListBots => list_bots(ctx, id).await.map(Some),
        ClientRequest::ListRankSystems => list_rank_systems(ctx, id).await.map(Some),
        ClientRequest::ManageServer { server_id } => {
            manage_server(ctx, handle, server_id).await?;
            Ok(None)
        }
        ClientRequest::ReservePort => reserve_port(ctx, id).await.map(Some),
        request @ (ClientRequest::Kick { .. }
        | ClientRequest::Ban { .. }
        | ClientRequest::ServerGroupAdd { .. }
        | ClientRequest::ServerGroupRemove { .. }
        | ClientRequest::GetServerGroupList
        | ClientRequest::GetChannelList) => match AdminCommand::from_request(&request) {
            Some(command) => admin_command(ctx, id, command).await,
            None => Ok(None),
        },
    }
}

/// Principal of `id` if it has `kind` attached in `registry`.
fn admitted(
    registry: &FeatureRegistry,
    id: ConnectionId,
    kind: HandlerKind,
) -> Result<Principal, RequestError> {
    if !registry.handles(id, kind) {
        return Err(RequestError::NotAdmitted(registry.feature()));
    }
    registry
        .principal(id)
        .ok_or(RequestError::NotAdmitted(registry.feature()))
}

async fn list_servers(ctx: &AppContext, id: ConnectionId) -> Result<ClientEvent, RequestError> {
    let registry = ctx.feature(Feature::Server);
    let principal = admitted(registry, id, HandlerKind::List)?;
    let servers = ctx.store.servers(&principal.filter()).await?;
    let servers = registry.join_visible(id, servers)?;
    Ok(ClientEvent::ServerList { servers })
}

async fn list_bots(ctx: &AppContext, id: ConnectionId) -> Result<ClientEvent, RequestError> {
    let registry = ctx.feature(Feature::Bot);
    let principal = admitted(registry, id, HandlerKind::List)?;
    let bots = ctx.store.bots(&principal.filter()).await?;
    let bots = registry.join_visible(id, bots)?;
    Ok(ClientEvent::BotList { bots })
}

async fn list_rank_systems(
    ctx: &AppContext,
    id: ConnectionId,
) -> Result<ClientEvent, RequestError> {
    let registry = ctx.feature(Feature::Rank);
    let principal = admitted(registry, id, HandlerKind::List)?;
    let rank_systems = ctx.store.rank_systems(&principal.filter()).await?;
    let rank_systems = registry.join_visible(id, rank_systems)?;
    Ok(ClientEvent::RankSystemList { rank_systems })
}

async fn manage_server(
    ctx: &AppContext,
    handle: &ConnectionHandle,
    server_id: RecordId,
) -> Result<(), RequestError> {
    let principal = admitted(
        ctx.feature(Feature::Server),
        handle.id(),
        HandlerKind::ManageServer,
    )?;
    let server = ctx
        .store
        .server(server_id)
        .await?
        .ok_or(RequestError::UnknownServer(server_id))?;
    if !principal.can_see(&server) {
        return Err(RequestError::Forbidden(server_id));
    }

    let session = ctx.sessions.acquire(handle.clone(), server).await;
    info!(conn = %handle.id(), session = %session.id(), server_id, "session requested");
    Ok(())
}

async fn admin_command(
    ctx: &AppContext,
    id: ConnectionId,
    command: AdminCommand,
) -> Result<Option<ClientEvent>, RequestError> {
    admitted(ctx.feature(Feature::Server), id, HandlerKind::AdminCommand)?;
    let session = ctx.sessions.get(id).ok_or(RequestError::NoSession)?;

    match session.execute(&command).await {
        Ok(reply) => Ok(reply),
        Err(SessionError::NotReady(state)) => {
            debug!(conn = %id, command = command.name(), %state, "session not ready, command ignored");
            Ok(None)
        }
        Err(e) => {
            warn!(conn = %id, command = command.name(), error = %e, "command failed");
            crate::metrics::record_request_error(command.name(), e.error_code());
            Ok(Some(ClientEvent::CommandFailed {
                command: command.name().to_string(),
                code: e.error_code().to_string(),
                message: e.to_string(),
            }))
        }
    }
}

async fn reserve_port(ctx: &AppContext, id: ConnectionId) -> Result<ClientEvent, RequestError> {
    admitted(ctx.feature(Feature::Server), id, HandlerKind::ReservePort)?;
    let port = ctx.ports.allocate().await?;
    Ok(ClientEvent::PortReserved { port })
}
