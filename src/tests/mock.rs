//! In-memory [`Connector`] whose links are driven from the test body.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::{
    prelude::*,
    ws::{ClientEvent, ConnectionConfig, Connector, Endpoint, Link, ServerEvent},
    Error,
};

pub(crate) fn test_config() -> ConnectionConfig {
    ConnectionConfig::new(Endpoint::orders("http://kitchen.test/api").unwrap())
}

/// What the next connect attempt does.
#[derive(Clone, Debug)]
pub(crate) enum Outcome {
    Accept,
    Refuse(&'static str),
}

enum ServerFrame {
    Event(ServerEvent),
    Fail(String),
    Close,
}

struct Inner {
    scripted: Mutex<VecDeque<Outcome>>,
    fallback: Mutex<Outcome>,
    attempts: AtomicUsize,
    auto_pong: AtomicBool,
    servers: UnboundedSender<MockServer>,
}

/// Accepts by default; every accepted link hands a [`MockServer`] to the test.
#[derive(Clone)]
pub(crate) struct MockConnector {
    inner: Arc<Inner>,
}

impl MockConnector {
    pub(crate) fn new() -> (Self, UnboundedReceiver<MockServer>) {
        let (servers, server_rx) = mpsc::unbounded_channel();
        let connector = Self {
            inner: Arc::new(Inner {
                scripted: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(Outcome::Accept),
                attempts: AtomicUsize::new(0),
                auto_pong: AtomicBool::new(false),
                servers,
            }),
        };
        (connector, server_rx)
    }

    /// Outcomes used, in order, before falling back.
    pub(crate) fn script(&self, outcomes: impl IntoIterator<Item = Outcome>) {
        self.inner.scripted.lock().unwrap().extend(outcomes);
    }

    pub(crate) fn set_fallback(&self, outcome: Outcome) {
        *self.inner.fallback.lock().unwrap() = outcome;
    }

    /// Links opened after this answer every `ping` with a `pong`.
    pub(crate) fn set_auto_pong(&self, enabled: bool) {
        self.inner.auto_pong.store(enabled, Ordering::SeqCst);
    }

    pub(crate) fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> Outcome {
        let scripted = self.inner.scripted.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.inner.fallback.lock().unwrap().clone())
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _endpoint: &Endpoint) -> Result<Box<dyn Link>> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        match self.next_outcome() {
            Outcome::Refuse(reason) => Err(Error::ws_connection(reason)),
            Outcome::Accept => {
                let (to_client, inbound) = mpsc::unbounded_channel();
                let (outbound, from_client) = mpsc::unbounded_channel();
                let closed = Arc::new(AtomicBool::new(false));
                let _ = self.inner.servers.send(MockServer {
                    to_client,
                    from_client,
                    closed: closed.clone(),
                });
                Ok(Box::new(MockLink {
                    inbound,
                    outbound,
                    closed,
                    auto_pong: self.inner.auto_pong.load(Ordering::SeqCst),
                    pending: VecDeque::new(),
                }))
            }
        }
    }
}

struct MockLink {
    inbound: UnboundedReceiver<ServerFrame>,
    outbound: UnboundedSender<ClientEvent>,
    closed: Arc<AtomicBool>,
    auto_pong: bool,
    pending: VecDeque<ServerEvent>,
}

#[async_trait]
impl Link for MockLink {
    async fn send(&mut self, event: &ClientEvent) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ws_send("link closed"));
        }
        if self.auto_pong && *event == ClientEvent::Ping {
            self.pending.push_back(ServerEvent::Pong);
        }
        let _ = self.outbound.send(event.clone());
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<ServerEvent>> {
        if let Some(event) = self.pending.pop_front() {
            return Some(Ok(event));
        }
        match self.inbound.recv().await {
            Some(ServerFrame::Event(event)) => Some(Ok(event)),
            Some(ServerFrame::Fail(reason)) => Some(Err(Error::ws_connection(reason))),
            Some(ServerFrame::Close) | None => None,
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Server side of one accepted link.
pub(crate) struct MockServer {
    to_client: UnboundedSender<ServerFrame>,
    from_client: UnboundedReceiver<ClientEvent>,
    closed: Arc<AtomicBool>,
}

impl MockServer {
    pub(crate) fn emit(&self, event: ServerEvent) {
        let _ = self.to_client.send(ServerFrame::Event(event));
    }

    pub(crate) fn emit_named(&self, name: &str, payload: Value) {
        self.emit(ServerEvent::from_named(name, payload));
    }

    /// Simulate a transport read error.
    pub(crate) fn fail(&self, reason: &str) {
        let _ = self.to_client.send(ServerFrame::Fail(reason.to_string()));
    }

    /// Simulate the server closing the session.
    pub(crate) fn close(&self) {
        let _ = self.to_client.send(ServerFrame::Close);
    }

    /// Next event the client sent; `None` once the client dropped the link.
    pub(crate) async fn next_sent(&mut self) -> Option<ClientEvent> {
        self.from_client.recv().await
    }

    pub(crate) fn drain_sent(&mut self) -> Vec<ClientEvent> {
        let mut sent = Vec::new();
        loop {
            match self.from_client.try_recv() {
                Ok(event) => sent.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        sent
    }

    /// Whether the client closed this link.
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
