//! The connection state machine.
//!
//! [`ConnectionManager`] owns the socket (through a spawned session task),
//! the keepalive watchdog and the reconnect schedule. It is driven by the
//! caller: [`tick`](ConnectionManager::tick) does all the work synchronously,
//! using the `now` it is given for every timing decision. Opening the socket
//! and reading from it happen on the Tokio runtime the manager was created
//! on; their results wait in a queue until the next tick.
//!
//! ```text
//! Disconnected --connect()--> Connecting --handshake written--> Connected
//!      ^                          |                                 |
//!      |                   open failed                         CAP REQ sent
//!      |                          v                                 v
//!      +------------------- Disconnected          CapabilitiesRequested
//!                                                                   |
//!                                                             welcome line
//!                                                                   v
//!  Lost <--- socket closed / no PONG within the timeout ---- Confirmed
//!   |
//!   +--next due tick--> Connecting
//! ```
//!
//! Every transition is published as [`ChatEvent::StatusChanged`]. Events
//! are queued in one outbox while the internal lock is held and published
//! after it is released, so handlers may call back into the manager. Only
//! one caller drains the outbox at a time; events queued by a handler or by
//! another thread meanwhile are published by that caller, after everything
//! queued before them. Subscribers therefore see transitions in the order
//! they happened, and the last status published is the current state.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, trace, warn};

use crate::bus::EventBus;
use crate::caps::{CapabilityNegotiator, NegotiationStatus};
use crate::command::Command;
use crate::config::{normalize_channel, ClientConfig, CredentialProvider};
use crate::error::{ClientError, Result};
use crate::event::ChatEvent;
use crate::line::{parse_line, ServerLine};
use crate::state::{ConnectionState, KeepaliveAction, KeepaliveState, ReconnectTimer};
use crate::transport::{
    spawn_session, Connector, SessionEvent, SessionHandle, SessionLimits, TcpConnector,
    TransportEvent,
};

/// What [`ConnectionManager::send_chat`] did with the text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Queued on the confirmed session.
    Sent,
    /// Not sent: the session is mid-handshake, lost or unusable.
    Dropped,
    /// Not sent; the manager was idle, so a connect attempt was started.
    ConnectTriggered,
}

struct Inner {
    state: ConnectionState,
    generation: u64,
    session: Option<SessionHandle>,
    channel: Option<String>,
    channel_override: Option<String>,
    keepalive: KeepaliveState,
    caps: CapabilityNegotiator,
    reconnect: ReconnectTimer,
    auto_reconnect: bool,
    inbox: UnboundedReceiver<SessionEvent>,
    outbox: VecDeque<ChatEvent>,
    publishing: bool,
}

impl Inner {
    fn transition(&mut self, to: ConnectionState) {
        if self.state == to {
            return;
        }
        debug!(from = %self.state, to = %to, "connection state");
        self.state = to;
        self.outbox.push_back(ChatEvent::StatusChanged { state: to });
    }

    fn send(&self, command: &Command) -> bool {
        self.session.as_ref().is_some_and(|s| s.send(command))
    }

    /// Forget the current session; dropping the handle closes the socket.
    fn teardown(&mut self) {
        self.session = None;
        self.channel = None;
        self.keepalive.reset();
        self.caps.reset();
    }

    fn is_current(&self, generation: u64) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.generation() == generation)
    }
}

/// Self-healing client connection to the chat server.
///
/// Construct it inside a Tokio runtime, subscribe to [`events`](Self::events),
/// call [`connect`](Self::connect) and then [`tick`](Self::tick) at a steady
/// cadence. All methods take `&self`; share it behind an `Arc` if several
/// tasks need it.
pub struct ConnectionManager<C: Connector = TcpConnector> {
    config: ClientConfig,
    credentials: Arc<dyn CredentialProvider>,
    connector: C,
    bus: Arc<EventBus>,
    runtime: Handle,
    events_tx: UnboundedSender<SessionEvent>,
    inner: Mutex<Inner>,
}

impl ConnectionManager<TcpConnector> {
    /// Manager connecting over plain TCP.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoRuntime`] when called outside a Tokio runtime.
    pub fn new<P>(config: ClientConfig, credentials: P) -> Result<Self>
    where
        P: CredentialProvider + 'static,
    {
        Self::with_connector(config, credentials, TcpConnector)
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// Manager opening its streams through `connector`.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoRuntime`] when called outside a Tokio runtime.
    pub fn with_connector<P>(config: ClientConfig, credentials: P, connector: C) -> Result<Self>
    where
        P: CredentialProvider + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| ClientError::NoRuntime)?;
        let (events_tx, inbox) = mpsc::unbounded_channel();
        let inner = Inner {
            state: ConnectionState::Disconnected,
            generation: 0,
            session: None,
            channel: None,
            channel_override: None,
            keepalive: KeepaliveState::new(config.ping_interval, config.pong_timeout),
            caps: CapabilityNegotiator::new(config.capabilities.clone(), config.capability_timeout),
            reconnect: ReconnectTimer::new(config.reconnect_delays.clone()),
            auto_reconnect: false,
            inbox,
            outbox: VecDeque::new(),
            publishing: false,
        };
        Ok(Self {
            config,
            credentials: Arc::new(credentials),
            connector,
            bus: Arc::new(EventBus::new()),
            runtime,
            events_tx,
            inner: Mutex::new(inner),
        })
    }

    /// Publish into `bus` instead of a private one.
    #[must_use]
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = bus;
        self
    }

    /// The bus events are published on.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// Whether a keepalive PING is outstanding.
    pub fn awaiting_pong(&self) -> bool {
        self.lock().keepalive.awaiting_pong()
    }

    /// Channel of the current session, if any.
    pub fn channel(&self) -> Option<String> {
        self.lock().channel.clone()
    }

    /// Outcome of this session's capability request.
    pub fn capabilities(&self) -> NegotiationStatus {
        self.lock().caps.status()
    }

    /// Start a connection attempt and arm automatic reconnects.
    ///
    /// A no-op while an attempt is in flight or a session is up, so at most
    /// one socket is ever being opened.
    ///
    /// # Errors
    ///
    /// [`ClientError::MissingCredential`] or
    /// [`ClientError::InvalidCredential`] when the provider has nothing
    /// usable. No attempt is made and the state is unchanged; later ticks
    /// keep asking the provider.
    pub fn connect(&self) -> Result<()> {
        let result = {
            let mut inner = self.lock();
            inner.auto_reconnect = true;
            self.start_attempt(&mut inner)
        };
        self.flush();
        result
    }

    /// Close the socket, cancel any attempt and stay down until the next
    /// [`connect`](Self::connect). Idempotent.
    pub fn disconnect(&self) {
        {
            let mut inner = self.lock();
            inner.auto_reconnect = false;
            if inner.session.is_some() {
                info!("disconnecting");
            }
            inner.teardown();
            inner.reconnect.reset();
            inner.transition(ConnectionState::Disconnected);
        }
        self.flush();
    }

    /// Send a chat line to the current channel.
    ///
    /// Only a confirmed session sends. While disconnected the text is
    /// dropped and a connect attempt starts instead; in any other state it
    /// is dropped.
    pub fn send_chat(&self, text: &str) -> SendOutcome {
        let outcome = {
            let mut inner = self.lock();
            let state = inner.state;
            match state {
                ConnectionState::Confirmed => match inner.channel.clone() {
                    Some(channel) if inner.send(&Command::privmsg(channel.as_str(), text)) => {
                        SendOutcome::Sent
                    }
                    _ => SendOutcome::Dropped,
                },
                ConnectionState::Disconnected => {
                    inner.auto_reconnect = true;
                    match self.start_attempt(&mut inner) {
                        Ok(()) => SendOutcome::ConnectTriggered,
                        Err(e) => {
                            warn!("chat dropped, cannot connect: {}", e);
                            SendOutcome::Dropped
                        }
                    }
                }
                _ => {
                    debug!(%state, "chat dropped, session not confirmed");
                    SendOutcome::Dropped
                }
            }
        };
        self.flush();
        outcome
    }

    /// Switch to another channel.
    ///
    /// A confirmed session parts the old channel and joins the new one in
    /// place. An attempt still in its handshake is restarted with the new
    /// channel. When down, the channel is remembered for the next attempt.
    ///
    /// # Errors
    ///
    /// [`ClientError::MissingCredential`] for an empty name, or a credential
    /// error from restarting the attempt.
    pub fn update_channel(&self, channel: &str) -> Result<()> {
        let channel = normalize_channel(channel);
        if channel.is_empty() {
            return Err(ClientError::MissingCredential("channel"));
        }

        let result = {
            let mut inner = self.lock();
            inner.channel_override = Some(channel.clone());
            let state = inner.state;
            match state {
                ConnectionState::Confirmed => {
                    if let Some(old) = inner.channel.clone() {
                        if old != channel {
                            inner.send(&Command::Part(old));
                            inner.send(&Command::Join(channel.clone()));
                            info!(%channel, "switched channel");
                        }
                    }
                    inner.channel = Some(channel);
                    Ok(())
                }
                _ if state.is_down() => Ok(()),
                _ => {
                    debug!(%channel, "restarting attempt for new channel");
                    inner.teardown();
                    inner.transition(ConnectionState::Disconnected);
                    inner.auto_reconnect = true;
                    self.start_attempt(&mut inner)
                }
            }
        };
        self.flush();
        result
    }

    /// Advance the state machine to `now`.
    ///
    /// In order: start a due reconnect, process everything the session task
    /// has reported (lines are parsed and published in arrival order), give
    /// up on an unanswered capability request, then run the keepalive
    /// watchdog.
    pub fn tick(&self, now: Instant) {
        {
            let mut guard = self.lock();
            let inner = &mut *guard;

            if inner.auto_reconnect && inner.state.is_down() && inner.reconnect.is_due(now) {
                if let Err(e) = self.start_attempt(inner) {
                    warn!("reconnect skipped: {}", e);
                    inner.reconnect.schedule(now);
                }
            }

            while let Ok(report) = inner.inbox.try_recv() {
                self.on_session_event(inner, report, now);
            }

            inner.caps.check_timeout(now);

            match inner.keepalive.poll(now) {
                KeepaliveAction::Idle => {}
                KeepaliveAction::SendPing => {
                    trace!(host = %self.config.host, "keepalive ping");
                    inner.send(&Command::Ping(self.config.host.clone()));
                }
                KeepaliveAction::TimedOut => {
                    warn!(timeout = ?self.config.pong_timeout, "no PONG received, connection lost");
                    self.lose(inner, now);
                }
            }
        }
        self.flush();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish queued events in order, unless another caller already is.
    fn flush(&self) {
        {
            let mut inner = self.lock();
            if inner.publishing {
                return;
            }
            inner.publishing = true;
        }
        let mut draining = Draining {
            manager: self,
            done: false,
        };

        loop {
            // Emptiness and the flag are settled under one lock so nothing
            // queued concurrently is left behind.
            let next = {
                let mut inner = self.lock();
                let next = inner.outbox.pop_front();
                if next.is_none() {
                    inner.publishing = false;
                }
                next
            };
            match next {
                Some(event) => {
                    self.bus.publish(&event);
                }
                None => {
                    draining.done = true;
                    return;
                }
            }
        }
    }

    fn start_attempt(&self, inner: &mut Inner) -> Result<()> {
        if !inner.state.is_down() || inner.session.is_some() {
            debug!(state = %inner.state, "connect ignored, already in progress");
            return Ok(());
        }

        let mut credentials = self
            .credentials
            .credentials()
            .ok_or(ClientError::MissingCredential("credentials"))?;
        if let Some(channel) = &inner.channel_override {
            credentials.channel = channel.clone();
        }
        credentials.validate()?;

        let handshake = vec![
            Command::Pass(credentials.token),
            Command::Nick(credentials.username.clone()),
            Command::User(credentials.username),
            Command::Join(credentials.channel.clone()),
        ];
        let limits = SessionLimits {
            max_line_len: self.config.max_line_len,
            connect_timeout: self.config.connect_timeout,
        };
        let address = self.config.address();

        inner.generation += 1;
        debug!(%address, generation = inner.generation, "connecting");
        let connecting = self.connector.connect(address);
        inner.session = Some(spawn_session(
            &self.runtime,
            connecting,
            handshake,
            limits,
            inner.generation,
            self.events_tx.clone(),
        ));
        inner.channel = Some(credentials.channel);
        inner.transition(ConnectionState::Connecting);
        Ok(())
    }

    fn on_session_event(&self, inner: &mut Inner, report: SessionEvent, now: Instant) {
        if !inner.is_current(report.generation) {
            trace!(generation = report.generation, "stale session event");
            return;
        }

        match report.event {
            TransportEvent::Connected => {
                inner.transition(ConnectionState::Connected);
                inner.keepalive.start(now);
                if let Some(request) = inner.caps.request(now) {
                    if inner.send(&request) {
                        inner.transition(ConnectionState::CapabilitiesRequested);
                    }
                }
            }
            TransportEvent::ConnectFailed(e) => {
                warn!("connect failed: {}", e);
                inner.teardown();
                inner.transition(ConnectionState::Disconnected);
                inner.reconnect.schedule(now);
            }
            TransportEvent::Line(line) => self.on_line(inner, &line),
            TransportEvent::Closed(Some(e)) => {
                warn!("connection error: {}", e);
                self.lose(inner, now);
            }
            TransportEvent::Closed(None) => {
                info!("server closed the connection");
                self.lose(inner, now);
            }
        }
    }

    fn on_line(&self, inner: &mut Inner, line: &str) {
        match parse_line(line) {
            None => trace!(%line, "ignored"),
            Some(ServerLine::Event(event)) => inner.outbox.push_back(event),
            Some(ServerLine::Ping { token }) => {
                inner.send(&Command::Pong(token));
            }
            Some(ServerLine::Pong { .. }) => inner.keepalive.pong_received(),
            Some(ServerLine::Welcome) => {
                if matches!(
                    inner.state,
                    ConnectionState::Connected | ConnectionState::CapabilitiesRequested
                ) {
                    info!(channel = ?inner.channel, "connection confirmed");
                    inner.reconnect.reset();
                    inner.outbox.push_back(ChatEvent::ConnectionConfirmed);
                    inner.transition(ConnectionState::Confirmed);
                }
            }
            Some(ServerLine::CapAck { caps }) => inner.caps.handle_ack(&caps),
            Some(ServerLine::CapNak { caps }) => inner.caps.handle_nak(&caps),
        }
    }

    fn lose(&self, inner: &mut Inner, now: Instant) {
        inner.teardown();
        inner.transition(ConnectionState::Lost);
        inner.reconnect.schedule(now);
    }
}

/// Releases the publishing flag if a handler panics mid-drain.
struct Draining<'a, C: Connector> {
    manager: &'a ConnectionManager<C>,
    done: bool,
}

impl<C: Connector> Drop for Draining<'_, C> {
    fn drop(&mut self) {
        if !self.done {
            self.manager.lock().publishing = false;
        }
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("address", &self.config.address())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
