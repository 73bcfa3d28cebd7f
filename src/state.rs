//! Sans-IO connection state, keepalive watchdog and reconnect schedule.
//!
//! Nothing in this module touches a socket or reads a clock. Callers pass
//! the current [`Instant`] in and act on the returned decisions, which keeps
//! every timing rule testable without a network or real time.
//!
//! # Example
//!
//! ```
//! use std::time::{Duration, Instant};
//! use slirc_tmi::state::{KeepaliveAction, KeepaliveState};
//!
//! let start = Instant::now();
//! let mut keepalive = KeepaliveState::new(Duration::from_secs(30), Duration::from_secs(10));
//! keepalive.start(start);
//!
//! assert_eq!(keepalive.poll(start + Duration::from_secs(29)), KeepaliveAction::Idle);
//! assert_eq!(keepalive.poll(start + Duration::from_secs(30)), KeepaliveAction::SendPing);
//! assert!(keepalive.awaiting_pong());
//!
//! keepalive.pong_received();
//! assert!(!keepalive.awaiting_pong());
//! ```

use std::fmt;
use std::time::{Duration, Instant};

/// State of the connection to the chat server.
///
/// Exactly one value is current at a time. See
/// [`ConnectionManager`](crate::connection::ConnectionManager) for the
/// transitions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// No socket and no attempt in flight.
    #[default]
    Disconnected,
    /// Socket open and handshake in progress.
    Connecting,
    /// Handshake sent.
    Connected,
    /// `CAP REQ` sent, awaiting the greeting.
    CapabilitiesRequested,
    /// Greeting received; chat may be sent.
    Confirmed,
    /// Socket broke or the keepalive timed out; a reconnect is scheduled.
    Lost,
}

impl ConnectionState {
    /// Whether the state machine is waiting for a (re)connect.
    pub fn is_down(self) -> bool {
        matches!(self, Self::Disconnected | Self::Lost)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::CapabilitiesRequested => "capabilities requested",
            Self::Confirmed => "confirmed",
            Self::Lost => "lost",
        };
        f.write_str(s)
    }
}

/// What the keepalive watchdog wants done on this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeepaliveAction {
    /// Nothing to do.
    Idle,
    /// Send `PING <host>` now.
    SendPing,
    /// No PONG within the timeout; the connection is dead.
    TimedOut,
}

/// Keepalive bookkeeping for one session.
///
/// `awaiting_pong` is true only between a PING being sent and either a PONG
/// arriving or the timeout elapsing.
#[derive(Clone, Debug)]
pub struct KeepaliveState {
    last_ping_sent_at: Option<Instant>,
    awaiting_pong: bool,
    ping_interval: Duration,
    pong_timeout: Duration,
    next_ping_at: Option<Instant>,
}

impl KeepaliveState {
    /// Create an idle watchdog.
    #[must_use]
    pub fn new(ping_interval: Duration, pong_timeout: Duration) -> Self {
        Self {
            last_ping_sent_at: None,
            awaiting_pong: false,
            ping_interval,
            pong_timeout,
            next_ping_at: None,
        }
    }

    /// Arm the watchdog for a fresh session. The first PING is due one
    /// interval after `now`.
    pub fn start(&mut self, now: Instant) {
        self.awaiting_pong = false;
        self.last_ping_sent_at = None;
        self.next_ping_at = Some(now + self.ping_interval);
    }

    /// Disarm the watchdog.
    pub fn reset(&mut self) {
        self.awaiting_pong = false;
        self.last_ping_sent_at = None;
        self.next_ping_at = None;
    }

    /// Advance the watchdog to `now`.
    ///
    /// A timeout is reported once; the watchdog disarms itself afterwards.
    pub fn poll(&mut self, now: Instant) -> KeepaliveAction {
        if self.awaiting_pong {
            let sent = self.last_ping_sent_at.unwrap_or(now);
            if now.saturating_duration_since(sent) >= self.pong_timeout {
                self.reset();
                return KeepaliveAction::TimedOut;
            }
            return KeepaliveAction::Idle;
        }

        match self.next_ping_at {
            Some(due) if now >= due => {
                self.awaiting_pong = true;
                self.last_ping_sent_at = Some(now);
                self.next_ping_at = Some(now + self.ping_interval);
                KeepaliveAction::SendPing
            }
            _ => KeepaliveAction::Idle,
        }
    }

    /// A PONG arrived.
    pub fn pong_received(&mut self) {
        self.awaiting_pong = false;
    }

    /// Whether a PING is outstanding.
    pub fn awaiting_pong(&self) -> bool {
        self.awaiting_pong
    }

    /// When the outstanding (or last) PING was sent.
    pub fn last_ping_sent_at(&self) -> Option<Instant> {
        self.last_ping_sent_at
    }

    /// Configured PING period.
    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    /// Configured PONG deadline.
    pub fn pong_timeout(&self) -> Duration {
        self.pong_timeout
    }
}

/// Reconnect schedule walking a list of delays.
///
/// Each failure pushes the next attempt out by the next delay in the list;
/// the last delay repeats. [`reset`](Self::reset) after a confirmed session.
#[derive(Clone, Debug)]
pub struct ReconnectTimer {
    attempts: usize,
    delays: Vec<Duration>,
    next_attempt_at: Option<Instant>,
}

impl ReconnectTimer {
    /// Create a timer over `delays`. An empty list means "retry every tick".
    #[must_use]
    pub fn new(delays: Vec<Duration>) -> Self {
        Self {
            attempts: 0,
            delays,
            next_attempt_at: None,
        }
    }

    /// The next delay, advancing the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self
            .delays
            .get(self.attempts)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or(Duration::ZERO);
        self.attempts += 1;
        delay
    }

    /// Schedule the next attempt relative to `now`.
    pub fn schedule(&mut self, now: Instant) {
        let delay = self.next_delay();
        self.next_attempt_at = Some(now + delay);
    }

    /// Whether an attempt may start at `now`. Unscheduled means due.
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_attempt_at.map_or(true, |at| now >= at)
    }

    /// Number of delays consumed since the last reset.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Start the schedule over.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.next_attempt_at = None;
    }
}

impl Default for ReconnectTimer {
    fn default() -> Self {
        Self::new(crate::config::default_reconnect_delays())
    }
}
