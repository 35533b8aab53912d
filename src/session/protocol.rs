//! ProtocolSession - one administrative query connection bound to one client
//! connection.
//!
//! The session runs on its own task:
//!
//! ```text
//! Connecting -> Authenticating -> SelectingTarget -> RegisteringEvents -> Ready
//!      |               |                 |                  |              |
//!      +---------------+-----------------+------------------+--------------+--> Failed / Disconnected
//! ```
//!
//! In `Ready` it drains one notification subscription covering client enter
//! and leave, so presence events reach the owner in emission order. Commands
//! are executed on the caller's task and only accepted in `Ready`.
//!
//! Teardown is exactly-once: unsubscribe, release the registry slot if this
//! session still occupies it, close the transport. Each step logs its own
//! failure and the rest still run.

use super::command::AdminCommand;
use super::presence::OnlineClientSet;
use super::state::SessionState;
use crate::config::QueryConfig;
use crate::error::SessionError;
use crate::ids::{ConnectionId, SessionId};
use crate::rooms::ConnectionHandle;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};
use voxfleet_proto::{
    ClientEvent, ClientRecord, EventSubscription, ManagedServer, Notification, NotifyKind,
    QueryCommand, QueryConnector, QueryTransport, RecordId, SubscriptionId, TransportError,
    normalize,
};

/// Connection id -> the session currently occupying that connection's slot.
pub(crate) type SessionMap = DashMap<ConnectionId, Arc<ProtocolSession>>;

/// Per-session query settings.
#[derive(Debug, Clone)]
pub struct QuerySettings {
    /// Display name set on the query connection.
    pub display_label: String,
    /// Virtual server index selected after login.
    pub virtual_server_id: u32,
    /// Upper bound for connect and for each request.
    pub request_timeout: Duration,
}

impl QuerySettings {
    pub fn from_config(config: &QueryConfig) -> Self {
        Self {
            display_label: config.display_label.clone(),
            virtual_server_id: config.virtual_server_id,
            request_timeout: config.request_timeout(),
        }
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self::from_config(&QueryConfig::default())
    }
}

struct Inner {
    state: SessionState,
    transport: Option<Arc<dyn QueryTransport>>,
    subscription: Option<SubscriptionId>,
}

pub struct ProtocolSession {
    id: SessionId,
    connection: ConnectionId,
    server: ManagedServer,
    owner: ConnectionHandle,
    settings: QuerySettings,
    inner: Mutex<Inner>,
    presence: Mutex<OnlineClientSet>,
    torn_down: AtomicBool,
    cancel: CancellationToken,
    slots: Weak<SessionMap>,
}

impl ProtocolSession {
    pub(crate) fn new(
        id: SessionId,
        owner: ConnectionHandle,
        server: ManagedServer,
        settings: QuerySettings,
        slots: Weak<SessionMap>,
    ) -> Arc<Self> {
        crate::metrics::session_opened();
        Arc::new(Self {
            id,
            connection: owner.id(),
            server,
            owner,
            settings,
            inner: Mutex::new(Inner {
                state: SessionState::Connecting,
                transport: None,
                subscription: None,
            }),
            presence: Mutex::new(OnlineClientSet::new()),
            torn_down: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            slots,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn server_id(&self) -> RecordId {
        self.server.id
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Current presence snapshot.
    pub fn online_clients(&self) -> Vec<ClientRecord> {
        self.presence.lock().snapshot()
    }

    /// Spawn the session driver.
    pub(crate) fn start(self: &Arc<Self>, connector: Arc<dyn QueryConnector>) -> JoinHandle<()> {
        let session = Arc::clone(self);
        let span = crate::telemetry::spans::session(self.id, self.connection, self.server.id);
        tokio::spawn(async move { session.drive(connector).await }.instrument(span))
    }

    async fn drive(self: Arc<Self>, connector: Arc<dyn QueryConnector>) {
        let established = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            result = self.establish(connector.as_ref()) => result,
        };
        match established {
            Ok(subscription) => self.pump(subscription).await,
            Err(SessionError::Cancelled) => debug!("session torn down during setup"),
            Err(e) => self.fail(e).await,
        }
    }

    async fn establish(
        &self,
        connector: &dyn QueryConnector,
    ) -> Result<EventSubscription, SessionError> {
        let endpoint = &self.server.query;
        info!(endpoint = %endpoint.address(), "opening query session");

        let transport = self.with_timeout(connector.connect(endpoint)).await?;
        if let Err(e) = self.attach_transport(Arc::clone(&transport)) {
            if let Err(close_err) = transport.close().await {
                debug!(error = %close_err, "closing orphaned transport failed");
            }
            return Err(e);
        }

        self.transition(SessionState::Authenticating)?;
        self.request(QueryCommand::Login {
            username: endpoint.username.clone(),
            password: endpoint.password.clone(),
        })
        .await?;

        self.transition(SessionState::SelectingTarget)?;
        self.request(QueryCommand::Use {
            sid: self.settings.virtual_server_id,
        })
        .await?;

        self.transition(SessionState::RegisteringEvents)?;
        self.request_optional(QueryCommand::SetThrottle { enabled: false })
            .await;
        self.request_optional(QueryCommand::ClientUpdate {
            nickname: self.settings.display_label.clone(),
        })
        .await;
        self.request_optional(QueryCommand::ServerNotifyRegister)
            .await;

        let subscription = self
            .with_timeout(transport.subscribe(&[NotifyKind::ClientEnter, NotifyKind::ClientLeave]))
            .await?;
        if let Err(e) = self.attach_subscription(subscription.id) {
            if let Err(unsub_err) = transport.unsubscribe(subscription.id) {
                debug!(error = %unsub_err, "dropping orphaned subscription failed");
            }
            return Err(e);
        }

        if let Err(e) = self.refresh_presence().await {
            warn!(error = %e, "initial presence snapshot failed");
        }

        self.transition(SessionState::Ready)?;
        info!("query session ready");
        self.owner.deliver(ClientEvent::SessionReady {
            server_id: self.server.id,
        });
        Ok(subscription)
    }

    async fn pump(&self, mut subscription: EventSubscription) {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = subscription.events.recv() => match next {
                    Some(notification) => self.on_notification(notification),
                    None => {
                        self.fail(TransportError::Closed.into()).await;
                        break;
                    }
                },
            }
        }
    }

    fn on_notification(&self, notification: Notification) {
        let Notification { kind, payload } = notification;
        for row in normalize(payload) {
            let Some(record) = ClientRecord::from_row(&row) else {
                debug!(?kind, "notification row without clid");
                continue;
            };
            match kind {
                NotifyKind::ClientEnter => {
                    let first_seen = self.presence.lock().enter(record.clone());
                    if first_seen {
                        self.owner.deliver(ClientEvent::ClientEntered(record));
                    }
                }
                NotifyKind::ClientLeave => {
                    let last_known = self.presence.lock().leave(record.clid);
                    if let Some(last_known) = last_known {
                        self.owner.deliver(ClientEvent::ClientLeft(last_known));
                    }
                }
            }
        }
    }

    /// Re-read the full client list and send it to the owner as one
    /// snapshot. Returns the number of voice clients online.
    pub async fn refresh_presence(&self) -> Result<usize, SessionError> {
        let raw = self.request(QueryCommand::ClientList).await?;
        let records: Vec<ClientRecord> = normalize(raw)
            .iter()
            .filter_map(ClientRecord::from_row)
            .collect();
        let snapshot = {
            let mut presence = self.presence.lock();
            presence.replace(records);
            presence.snapshot()
        };
        let count = snapshot.len();
        self.owner.deliver(ClientEvent::OnlineClients {
            server_id: self.server.id,
            clients: snapshot,
        });
        Ok(count)
    }

    /// Forward one command. Rejected with [`SessionError::NotReady`] outside
    /// `Ready`; a failed request leaves the session up.
    pub async fn execute(&self, command: &AdminCommand) -> Result<Option<ClientEvent>, SessionError> {
        let state = self.state();
        if state != SessionState::Ready {
            return Err(SessionError::NotReady(state));
        }
        let raw = self.request(command.to_query()).await?;
        Ok(command.reply(raw))
    }

    async fn fail(&self, error: SessionError) {
        if self.is_torn_down() {
            debug!(error = %error, "error after teardown ignored");
            return;
        }
        warn!(error = %error, code = error.error_code(), "query session failed");
        crate::metrics::record_session_failure(error.error_code());
        self.set_terminal(SessionState::Failed);
        self.owner.deliver(ClientEvent::BotConnectionError {
            server_id: self.server.id,
            message: error.to_string(),
        });
        self.disconnect().await;
    }

    /// Tear the session down. Idempotent; never fails.
    pub async fn disconnect(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();

        let (transport, subscription) = {
            let mut inner = self.inner.lock();
            if !inner.state.is_terminal() {
                inner.state = SessionState::Disconnected;
            }
            (inner.transport.take(), inner.subscription.take())
        };

        if let (Some(transport), Some(id)) = (&transport, subscription)
            && let Err(e) = transport.unsubscribe(id)
        {
            warn!(error = %e, "unsubscribe failed");
        }

        self.release_slot();

        if let Some(transport) = transport
            && let Err(e) = transport.close().await
        {
            warn!(error = %e, "closing query transport failed");
        }

        crate::metrics::session_closed();
        info!(state = %self.state(), "query session torn down");
    }

    fn release_slot(&self) {
        if let Some(slots) = self.slots.upgrade() {
            slots.remove_if(&self.connection, |_, occupant| occupant.id == self.id);
        }
    }

    fn transition(&self, next: SessionState) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        if self.is_torn_down() {
            return Err(SessionError::Cancelled);
        }
        let from = inner.state;
        if !from.can_transition_to(next) {
            return Err(SessionError::InvalidTransition { from, to: next });
        }
        inner.state = next;
        drop(inner);
        debug!(%from, to = %next, "session state");
        Ok(())
    }

    fn set_terminal(&self, state: SessionState) {
        let mut inner = self.inner.lock();
        if !inner.state.is_terminal() {
            inner.state = state;
        }
    }

    fn attach_transport(&self, transport: Arc<dyn QueryTransport>) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        if self.is_torn_down() {
            return Err(SessionError::Cancelled);
        }
        inner.transport = Some(transport);
        Ok(())
    }

    fn attach_subscription(&self, id: SubscriptionId) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        if self.is_torn_down() {
            return Err(SessionError::Cancelled);
        }
        inner.subscription = Some(id);
        Ok(())
    }

    fn transport(&self) -> Result<Arc<dyn QueryTransport>, SessionError> {
        self.inner
            .lock()
            .transport
            .clone()
            .ok_or(SessionError::NotConnected)
    }

    async fn request(&self, command: QueryCommand) -> Result<Value, SessionError> {
        let transport = self.transport()?;
        debug!(command = command.name(), "query request");
        self.with_timeout(transport.send(command)).await
    }

    async fn request_optional(&self, command: QueryCommand) {
        let name = command.name();
        if let Err(e) = self.request(command).await {
            warn!(command = name, error = %e, "optional setup step failed");
        }
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, SessionError> {
        match tokio::time::timeout(self.settings.request_timeout, fut).await {
            Ok(result) => result.map_err(SessionError::from),
            Err(_) => Err(TransportError::Timeout(self.settings.request_timeout).into()),
        }
    }
}
