use std::{collections::HashMap, time::Duration};

use log::{debug, error, info, warn};
use tokio::{
    spawn,
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender},
        oneshot, watch,
    },
    task::JoinHandle,
    time::{self, Instant, Interval, MissedTickBehavior},
};

use super::{
    endpoint::Endpoint,
    message_types::{ClientEvent, EventKind, ServerEvent},
    reconnection::{
        ConnectionState, ConnectionStatus, HeartbeatConfig, ReconnectConfig, ReconnectPolicy,
    },
    transport::{Connector, Link, SocketIoConnector},
};
use crate::{prelude::*, Error};

/// Upper bound for a best-effort close of a link that is being dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything the connection task needs to reach and keep the orders channel.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub endpoint: Endpoint,
    pub heartbeat: HeartbeatConfig,
    pub reconnect: ReconnectConfig,
    /// Limit for the websocket + namespace handshake (default: 20s)
    pub connect_timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            heartbeat: HeartbeatConfig::default(),
            reconnect: ReconnectConfig::default(),
            connect_timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug)]
enum Command {
    Connect(oneshot::Sender<Result<()>>),
    Disconnect(oneshot::Sender<()>),
    Resume,
    Send(ClientEvent),
    Subscribe(EventKind, UnboundedSender<ServerEvent>),
}

/// Handle to the connection task.
///
/// The task owns the link, the heartbeat and the reconnect timer; this handle
/// only sends it commands and reads the published [`ConnectionStatus`].
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct ConnectionManager {
    commands: UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Manager speaking Socket.IO over a real websocket.
    pub fn new(config: ConnectionConfig) -> Self {
        let connector = SocketIoConnector::new(config.connect_timeout);
        Self::with_connector(config, connector)
    }

    pub fn with_connector<C: Connector + 'static>(config: ConnectionConfig, connector: C) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(ConnectionStatus::default());
        let driver = ConnectionDriver::new(config, Box::new(connector), command_rx, status_tx);
        let task = spawn(driver.run());
        Self {
            commands,
            status,
            task,
        }
    }

    /// Connect now. Resolves once the namespace is joined or the attempt failed.
    ///
    /// A failure here is returned to the caller and not retried; retries only
    /// follow the loss of an established connection.
    pub async fn connect(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send_command(Command::Connect(tx))?;
        rx.await.map_err(|_| Error::ManagerStopped)?
    }

    /// Close the connection and cancel any pending reconnect.
    pub async fn disconnect(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send_command(Command::Disconnect(tx))?;
        rx.await.map_err(|_| Error::ManagerStopped)
    }

    /// The host became active again: try immediately unless connected or
    /// disconnected on purpose.
    pub fn resume(&self) -> Result<()> {
        self.send_command(Command::Resume)
    }

    pub fn request_orders(&self) -> Result<()> {
        self.send_command(Command::Send(ClientEvent::GetOrders))
    }

    pub fn update_order_status(&self, order_id: u64, status: &str) -> Result<()> {
        self.send_command(Command::Send(ClientEvent::update_order_status(
            order_id, status,
        )))
    }

    /// Route events of `kind` to `handler`, replacing any previous handler.
    pub fn on(&self, kind: EventKind, handler: UnboundedSender<ServerEvent>) -> Result<()> {
        self.send_command(Command::Subscribe(kind, handler))
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().is_connected()
    }

    fn send_command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::ManagerStopped)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct ConnectionDriver {
    config: ConnectionConfig,
    connector: Box<dyn Connector>,
    commands: UnboundedReceiver<Command>,
    status_tx: watch::Sender<ConnectionStatus>,
    handlers: HashMap<EventKind, UnboundedSender<ServerEvent>>,
    link: Option<Box<dyn Link>>,
    state: ConnectionState,
    policy: ReconnectPolicy,
    manual_disconnect: bool,
    heartbeat: Option<Interval>,
    last_pong: Instant,
    reconnect_at: Option<Instant>,
    last_error: Option<String>,
    reconnection_count: u64,
    pong_timeout_count: u64,
}

impl ConnectionDriver {
    fn new(
        config: ConnectionConfig,
        connector: Box<dyn Connector>,
        commands: UnboundedReceiver<Command>,
        status_tx: watch::Sender<ConnectionStatus>,
    ) -> Self {
        let policy = ReconnectPolicy::new(config.reconnect.clone());
        Self {
            config,
            connector,
            commands,
            status_tx,
            handlers: HashMap::new(),
            link: None,
            state: ConnectionState::Disconnected,
            policy,
            manual_disconnect: false,
            heartbeat: None,
            last_pong: Instant::now(),
            reconnect_at: None,
            last_error: None,
            reconnection_count: 0,
            pong_timeout_count: 0,
        }
    }

    async fn run(mut self) {
        loop {
            let connected = self.link.is_some();
            let liveness_deadline = self.last_pong + self.config.heartbeat.pong_timeout;
            let reconnect_at = self.reconnect_at;

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                event = next_event(&mut self.link), if connected => {
                    self.handle_inbound(event).await;
                }
                _ = next_tick(&mut self.heartbeat), if connected => {
                    self.send_event(ClientEvent::Ping).await;
                }
                _ = time::sleep_until(liveness_deadline), if connected => {
                    self.pong_timeout_count += 1;
                    warn!(
                        "No pong for {:?}, connection considered dead (timeouts={})",
                        self.config.heartbeat.pong_timeout, self.pong_timeout_count
                    );
                    self.on_connection_lost("heartbeat timeout").await;
                }
                _ = time::sleep_until(reconnect_at.unwrap_or_else(Instant::now)), if reconnect_at.is_some() => {
                    self.attempt_reconnect().await;
                }
            }
        }

        self.manual_disconnect = true;
        self.drop_link().await;
        warn!("connection manager task stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(reply) => {
                let result = self.connect_now().await;
                if reply.send(result).is_err() {
                    debug!("connect caller went away before the result");
                }
            }
            Command::Disconnect(reply) => {
                self.disconnect_now().await;
                let _ = reply.send(());
            }
            Command::Resume => self.resume().await,
            Command::Send(event) => self.send_event(event).await,
            Command::Subscribe(kind, handler) => {
                if self.handlers.insert(kind, handler).is_some() {
                    debug!("Replaced handler for {kind}");
                }
            }
        }
    }

    async fn connect_now(&mut self) -> Result<()> {
        self.manual_disconnect = false;
        if self.state == ConnectionState::Connected {
            return Ok(());
        }
        self.reconnect_at = None;
        self.policy.reset();

        if let Err(err) = self.establish().await {
            error!("Could not connect to {}: {err}", self.config.endpoint);
            self.last_error = Some(err.to_string());
            self.set_state(ConnectionState::Disconnected);
            return Err(err);
        }
        Ok(())
    }

    async fn disconnect_now(&mut self) {
        self.manual_disconnect = true;
        self.reconnect_at = None;
        self.drop_link().await;
        self.set_state(ConnectionState::Disconnected);
        info!("Disconnected by caller");
    }

    async fn resume(&mut self) {
        let previous = self.state;
        if self.manual_disconnect
            || matches!(
                previous,
                ConnectionState::Connected | ConnectionState::Connecting
            )
        {
            debug!("Resume ignored in state {previous}");
            return;
        }

        info!("Resumed while {previous}, connecting immediately");
        self.reconnect_at = None;
        if let Err(err) = self.establish().await {
            warn!("Immediate reconnect failed: {err}");
            self.last_error = Some(err.to_string());
            match previous {
                ConnectionState::Reconnecting => self.schedule_reconnect(),
                other => self.set_state(other),
            }
        }
    }

    async fn attempt_reconnect(&mut self) {
        self.reconnect_at = None;
        let attempt = self.policy.attempts();
        info!("Reconnecting (attempt {attempt}/{})", self.policy.max_attempts());

        match self.establish().await {
            Ok(()) => {
                self.reconnection_count += 1;
                info!(
                    "Reconnect finished successfully (reconnections={})",
                    self.reconnection_count
                );
                self.publish();
            }
            Err(err) => {
                error!("Could not reconnect on attempt {attempt}: {err}");
                self.last_error = Some(err.to_string());
                self.schedule_reconnect();
            }
        }
    }

    async fn establish(&mut self) -> Result<()> {
        self.set_state(ConnectionState::Connecting);
        let link = self.connector.connect(&self.config.endpoint).await?;

        let ping_interval = self.config.heartbeat.ping_interval;
        let mut heartbeat = time::interval_at(Instant::now() + ping_interval, ping_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.link = Some(link);
        self.heartbeat = Some(heartbeat);
        self.last_pong = Instant::now();
        self.reconnect_at = None;
        self.last_error = None;
        self.policy.reset();
        self.set_state(ConnectionState::Connected);
        info!("Connected to {}", self.config.endpoint);

        self.send_event(ClientEvent::GetOrders).await;
        Ok(())
    }

    async fn on_connection_lost(&mut self, reason: &str) {
        self.drop_link().await;
        self.last_error = Some(reason.to_string());
        if self.manual_disconnect {
            self.set_state(ConnectionState::Disconnected);
            return;
        }
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        match self.policy.next_delay() {
            Some(delay) => {
                info!(
                    "Scheduling reconnect attempt {}/{} in {}ms",
                    self.policy.attempts(),
                    self.policy.max_attempts(),
                    delay.as_millis()
                );
                self.reconnect_at = Some(Instant::now() + delay);
                self.set_state(ConnectionState::Reconnecting);
            }
            None => {
                error!(
                    "Max reconnection attempts ({}) exceeded, giving up",
                    self.policy.max_attempts()
                );
                self.reconnect_at = None;
                self.set_state(ConnectionState::Failed);
            }
        }
    }

    async fn drop_link(&mut self) {
        self.heartbeat = None;
        if let Some(mut link) = self.link.take() {
            if time::timeout(CLOSE_TIMEOUT, link.close()).await.is_err() {
                debug!("Timed out closing link");
            }
        }
    }

    async fn handle_inbound(&mut self, event: Option<Result<ServerEvent>>) {
        match event {
            None => {
                warn!("Server closed the connection");
                self.on_connection_lost("connection closed by server").await;
            }
            Some(Err(err)) => {
                error!("Error reading from connection: {err}");
                self.on_connection_lost(&err.to_string()).await;
            }
            Some(Ok(ServerEvent::Pong)) => {
                debug!("Received pong");
                self.last_pong = Instant::now();
            }
            Some(Ok(event)) => self.dispatch(event),
        }
    }

    fn dispatch(&mut self, event: ServerEvent) {
        let Some(kind) = event.kind() else {
            debug!("Ignoring event {}", event.name());
            return;
        };
        match self.handlers.get(&kind) {
            Some(handler) => {
                if handler.send(event).is_err() {
                    warn!("Handler for {kind} is gone, removing it");
                    self.handlers.remove(&kind);
                }
            }
            None => debug!("No handler for {kind}"),
        }
    }

    async fn send_event(&mut self, event: ClientEvent) {
        let Some(link) = self.link.as_mut() else {
            warn!("Not connected, dropping {}", event.name());
            return;
        };
        debug!("Sending {}", event.name());
        if let Err(err) = link.send(&event).await {
            error!("Error sending {}: {err}", event.name());
            self.on_connection_lost(&err.to_string()).await;
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("Connection state {} -> {state}", self.state);
        }
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        let status = ConnectionStatus {
            state: self.state,
            attempts: self.policy.attempts(),
            next_retry_in: self
                .reconnect_at
                .map(|at| at.saturating_duration_since(Instant::now())),
            last_error: self.last_error.clone(),
            reconnection_count: self.reconnection_count,
        };
        self.status_tx.send_replace(status);
    }
}

async fn next_event(link: &mut Option<Box<dyn Link>>) -> Option<Result<ServerEvent>> {
    match link {
        Some(link) => link.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(heartbeat) => {
            heartbeat.tick().await;
        }
        None => std::future::pending().await,
    }
}
