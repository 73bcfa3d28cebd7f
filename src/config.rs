//! Client configuration and credentials.

use std::time::Duration;

use crate::caps::Capability;
use crate::error::{ClientError, Result};
use crate::util::{is_illegal_control_char, MAX_LINE_LEN};

/// Default chat server host.
pub const DEFAULT_HOST: &str = "irc.chat.twitch.tv";

/// Plaintext chat port.
pub const DEFAULT_PORT: u16 = 6667;

/// Default reconnect schedule: next tick, then 1, 2, 5 and 10 seconds.
pub fn default_reconnect_delays() -> Vec<Duration> {
    [0, 1, 2, 5, 10].into_iter().map(Duration::from_secs).collect()
}

/// Connection tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientConfig {
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Time between keepalive PINGs.
    pub ping_interval: Duration,
    /// How long to wait for a PONG before declaring the connection lost.
    pub pong_timeout: Duration,
    /// Upper bound for opening the socket and writing the handshake.
    pub connect_timeout: Duration,
    /// Capabilities requested after the handshake.
    pub capabilities: Vec<Capability>,
    /// How long to wait for `CAP ACK` before proceeding without.
    pub capability_timeout: Duration,
    /// Delays between consecutive reconnect attempts; the last repeats.
    pub reconnect_delays: Vec<Duration>,
    /// Longest inbound line accepted; longer lines are discarded.
    pub max_line_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            capabilities: Capability::defaults(),
            capability_timeout: Duration::from_secs(10),
            reconnect_delays: default_reconnect_delays(),
            max_line_len: MAX_LINE_LEN,
        }
    }
}

impl ClientConfig {
    /// Set host and port.
    #[must_use]
    pub fn with_server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Set the keepalive period.
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set the PONG deadline.
    #[must_use]
    pub fn with_pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    /// Set the connect deadline.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Replace the requested capabilities.
    #[must_use]
    pub fn with_capabilities(mut self, caps: Vec<Capability>) -> Self {
        self.capabilities = caps;
        self
    }

    /// Replace the reconnect schedule.
    #[must_use]
    pub fn with_reconnect_delays(mut self, delays: Vec<Duration>) -> Self {
        self.reconnect_delays = delays;
        self
    }

    /// `host:port` for the socket factory.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Login data for one connection attempt.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Credentials {
    /// Login name, also used as nick.
    pub username: String,
    /// OAuth token sent with `PASS`.
    pub token: String,
    /// Channel to join, without the leading `#`.
    pub channel: String,
}

impl Credentials {
    /// Build credentials. The channel loses any leading `#` and is
    /// lowercased, as channel names on the chat servers are.
    pub fn new(
        username: impl Into<String>,
        token: impl Into<String>,
        channel: impl AsRef<str>,
    ) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
            channel: normalize_channel(channel.as_ref()),
        }
    }

    /// Check every field is present and safe to put on the wire.
    pub fn validate(&self) -> Result<()> {
        check_field("username", &self.username)?;
        check_field("token", &self.token)?;
        check_field("channel", &self.channel)?;
        Ok(())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .field("channel", &self.channel)
            .finish()
    }
}

/// Strip a leading `#` and lowercase.
pub fn normalize_channel(channel: &str) -> String {
    channel.trim().trim_start_matches('#').to_lowercase()
}

fn check_field(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ClientError::MissingCredential(field));
    }
    if value.chars().any(|c| c.is_whitespace() || is_illegal_control_char(c)) {
        return Err(ClientError::InvalidCredential {
            field,
            reason: "contains whitespace or control characters",
        });
    }
    Ok(())
}

/// Source of credentials, consulted on every connect attempt.
pub trait CredentialProvider: Send + Sync {
    /// Current credentials, or `None` if none are stored.
    fn credentials(&self) -> Option<Credentials>;
}

impl CredentialProvider for Credentials {
    fn credentials(&self) -> Option<Credentials> {
        Some(self.clone())
    }
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Option<Credentials> + Send + Sync,
{
    fn credentials(&self) -> Option<Credentials> {
        self()
    }
}
