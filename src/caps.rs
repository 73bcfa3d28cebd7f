//! Capability negotiation for the chat servers.
//!
//! After the handshake the client sends one `CAP REQ` listing the
//! capabilities it wants. The server answers with `CAP * ACK` or
//! `CAP * NAK`. Neither answer is required: if nothing arrives within the
//! negotiation window the client carries on without extended capabilities,
//! and sender names fall back to the prefix nick.

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::command::Command;

/// Capabilities understood by the chat servers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Capability {
    /// JOIN, PART and names replies for other users.
    Membership,
    /// Message tags such as `display-name`.
    Tags,
    /// Platform-specific commands (CLEARCHAT, USERNOTICE, ...).
    Commands,
    /// Anything else.
    Custom(String),
}

impl Capability {
    /// The three capabilities requested by default.
    pub fn defaults() -> Vec<Capability> {
        vec![Self::Membership, Self::Tags, Self::Commands]
    }
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        match self {
            Self::Membership => "twitch.tv/membership",
            Self::Tags => "twitch.tv/tags",
            Self::Commands => "twitch.tv/commands",
            Self::Custom(s) => s,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        match s {
            "twitch.tv/membership" => Self::Membership,
            "twitch.tv/tags" => Self::Tags,
            "twitch.tv/commands" => Self::Commands,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// Outcome of a negotiation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStatus {
    /// No request sent yet.
    Idle,
    /// `CAP REQ` sent, no answer yet.
    Requested,
    /// The server acknowledged the request.
    Acknowledged,
    /// The server rejected the request, or never answered.
    Unavailable,
}

/// Tracks one capability request per session.
#[derive(Debug, Clone)]
pub struct CapabilityNegotiator {
    wanted: Vec<Capability>,
    enabled: HashSet<Capability>,
    status: NegotiationStatus,
    requested_at: Option<Instant>,
    window: Duration,
}

impl CapabilityNegotiator {
    /// Create a negotiator for `wanted`, giving up after `window`.
    #[must_use]
    pub fn new(wanted: Vec<Capability>, window: Duration) -> Self {
        Self {
            wanted,
            enabled: HashSet::new(),
            status: NegotiationStatus::Idle,
            requested_at: None,
            window,
        }
    }

    /// Build the `CAP REQ` command and start the negotiation window.
    ///
    /// Returns `None` when there is nothing to request.
    #[must_use]
    pub fn request(&mut self, now: Instant) -> Option<Command> {
        self.enabled.clear();
        if self.wanted.is_empty() {
            self.status = NegotiationStatus::Unavailable;
            return None;
        }
        self.status = NegotiationStatus::Requested;
        self.requested_at = Some(now);
        Some(Command::CapReq(self.wanted.clone()))
    }

    /// Record a `CAP * ACK` listing `caps`.
    pub fn handle_ack<S: AsRef<str>>(&mut self, caps: &[S]) {
        for cap in caps {
            let name = cap.as_ref();
            if !name.starts_with('-') {
                self.enabled.insert(Capability::from(name));
            }
        }
        self.status = NegotiationStatus::Acknowledged;
        debug!(enabled = ?self.enabled, "capabilities acknowledged");
    }

    /// Record a `CAP * NAK`. Not fatal.
    pub fn handle_nak<S: AsRef<str>>(&mut self, caps: &[S]) {
        let rejected: Vec<&str> = caps.iter().map(AsRef::as_ref).collect();
        warn!(?rejected, "capabilities rejected, continuing without them");
        if self.status == NegotiationStatus::Requested {
            self.status = NegotiationStatus::Unavailable;
        }
    }

    /// Give up waiting once the window has passed. Returns `true` exactly
    /// once, on the tick that expires the request.
    pub fn check_timeout(&mut self, now: Instant) -> bool {
        if self.status != NegotiationStatus::Requested {
            return false;
        }
        let expired = self
            .requested_at
            .is_some_and(|at| now.saturating_duration_since(at) >= self.window);
        if expired {
            warn!("no capability acknowledgement, continuing without extended capabilities");
            self.status = NegotiationStatus::Unavailable;
        }
        expired
    }

    /// Forget the current session.
    pub fn reset(&mut self) {
        self.enabled.clear();
        self.status = NegotiationStatus::Idle;
        self.requested_at = None;
    }

    /// Current status.
    pub fn status(&self) -> NegotiationStatus {
        self.status
    }

    /// Whether the server acknowledged the request.
    pub fn is_acknowledged(&self) -> bool {
        self.status == NegotiationStatus::Acknowledged
    }

    /// Whether `cap` is enabled for this session.
    pub fn is_enabled(&self, cap: &Capability) -> bool {
        self.enabled.contains(cap)
    }
}
