//! Scripted query transport and port probe.
//!
//! `MockConnector` hands out `MockTransport`s that answer every request from
//! a script, record what they were sent, and let the test push notifications
//! into live subscriptions.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use voxfleet::ports::PortProbe;
use voxfleet_proto::{
    EventSubscription, Notification, NotifyKind, QueryCommand, QueryConnector, QueryEndpoint,
    QueryTransport, SubscriptionId, TransportError,
};

/// How new transports behave.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Fail `connect` outright.
    pub refuse_connect: bool,
    /// Delay before `connect` returns.
    pub connect_delay: Option<Duration>,
    /// Commands (by query name) answered with an error.
    pub failing: HashSet<&'static str>,
    /// Reply to `clientlist`.
    pub clients: Value,
    /// Commands (by query name) that take this long to answer.
    pub delays: HashMap<&'static str, Duration>,
}

#[derive(Default)]
pub struct MockConnector {
    script: Mutex<Script>,
    transports: Mutex<Vec<Arc<MockTransport>>>,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scripted(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            ..Self::default()
        })
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock() = script;
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn transports(&self) -> Vec<Arc<MockTransport>> {
        self.transports.lock().clone()
    }

    pub fn last(&self) -> Option<Arc<MockTransport>> {
        self.transports.lock().last().cloned()
    }
}

#[async_trait]
impl QueryConnector for MockConnector {
    async fn connect(
        &self,
        endpoint: &QueryEndpoint,
    ) -> Result<Arc<dyn QueryTransport>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().clone();
        if let Some(delay) = script.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if script.refuse_connect {
            return Err(TransportError::Connect {
                endpoint: endpoint.address(),
                reason: "connection refused".into(),
            });
        }
        let transport = Arc::new(MockTransport::new(script));
        self.transports.lock().push(Arc::clone(&transport));
        Ok(transport)
    }
}

pub struct MockTransport {
    script: Script,
    sent: Mutex<Vec<QueryCommand>>,
    subscribers: Mutex<HashMap<SubscriptionId, mpsc::UnboundedSender<Notification>>>,
    next_subscription: AtomicU64,
    closes: AtomicUsize,
    unsubscribes: AtomicUsize,
}

impl MockTransport {
    fn new(script: Script) -> Self {
        Self {
            script,
            sent: Mutex::new(Vec::new()),
            subscribers: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
            closes: AtomicUsize::new(0),
            unsubscribes: AtomicUsize::new(0),
        }
    }

    /// Deliver a notification to every live subscription.
    pub fn push(&self, kind: NotifyKind, payload: Value) -> usize {
        let subscribers = self.subscribers.lock();
        subscribers
            .values()
            .filter(|tx| {
                tx.send(Notification {
                    kind,
                    payload: payload.clone(),
                })
                .is_ok()
            })
            .count()
    }

    /// Simulate the server dropping the connection.
    pub fn sever(&self) {
        self.subscribers.lock().clear();
    }

    pub fn sent_names(&self) -> Vec<&'static str> {
        self.sent.lock().iter().map(QueryCommand::name).collect()
    }

    pub fn sent(&self) -> Vec<QueryCommand> {
        self.sent.lock().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[async_trait]
impl QueryTransport for MockTransport {
    async fn send(&self, command: QueryCommand) -> Result<Value, TransportError> {
        let name = command.name();
        self.sent.lock().push(command);
        if let Some(delay) = self.script.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }
        if self.closes.load(Ordering::SeqCst) > 0 {
            return Err(TransportError::Closed);
        }
        if self.script.failing.contains(name) {
            return Err(TransportError::Rejected {
                id: 1281,
                message: format!("{name} refused"),
            });
        }
        let reply = match name {
            "clientlist" => self.script.clients.clone(),
            "servergrouplist" => json!({ "sgid": [6, 7], "name": ["Admin", "Guest"] }),
            "channellist" => json!({ "cid": [1, 2], "channel_name": ["Lobby", "AFK"] }),
            _ => json!({}),
        };
        Ok(reply)
    }

    async fn subscribe(&self, _kinds: &[NotifyKind]) -> Result<EventSubscription, TransportError> {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        let (tx, events) = mpsc::unbounded_channel();
        self.subscribers.lock().insert(id, tx);
        Ok(EventSubscription { id, events })
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), TransportError> {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().remove(&id);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().clear();
        Ok(())
    }
}

/// Probe that reports a fixed set of ports as bound by someone else.
#[derive(Default)]
pub struct FixedProbe {
    busy: Mutex<HashSet<u16>>,
}

impl FixedProbe {
    pub fn new(busy: impl IntoIterator<Item = u16>) -> Arc<Self> {
        Arc::new(Self {
            busy: Mutex::new(busy.into_iter().collect()),
        })
    }
}

#[async_trait]
impl PortProbe for FixedProbe {
    async fn is_free(&self, port: u16) -> bool {
        !self.busy.lock().contains(&port)
    }
}
