//! # slirc-tmi
//!
//! A client core for Twitch's IRC-derived chat protocol.
//!
//! ## Features
//!
//! - Line parser turning raw protocol text into typed [`ChatEvent`]s
//! - Capability negotiation for the `twitch.tv/*` extensions
//! - In-process [`EventBus`] with four independent channels
//! - Tick-driven [`ConnectionManager`] with keepalive watchdog and
//!   reconnect backoff (`tokio` feature, on by default)
//!
//! The protocol modules compile without any runtime; only the connection,
//! transport and codec need Tokio.

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Quick Start
//!
//! ### Parsing lines
//!
//! ```rust
//! use slirc_tmi::line::{parse_line, ServerLine};
//! use slirc_tmi::ChatEvent;
//!
//! let parsed = parse_line(":nick!user@host JOIN #chan");
//! assert_eq!(
//!     parsed,
//!     Some(ServerLine::Event(ChatEvent::MembershipChanged {
//!         user: "nick".to_string(),
//!         joined: true,
//!     }))
//! );
//! ```
//!
//! ### Running a connection
//!
//! ```no_run
//! # #[cfg(feature = "tokio")]
//! # async fn run() -> slirc_tmi::Result<()> {
//! use std::time::{Duration, Instant};
//! use slirc_tmi::{ChatEvent, ClientConfig, ConnectionManager, Credentials, EventChannel};
//!
//! let credentials = Credentials::new("mybot", "oauth:token", "#somechannel");
//! let manager = ConnectionManager::new(ClientConfig::default(), credentials)?;
//!
//! manager.events().subscribe(EventChannel::Message, |event: &ChatEvent| {
//!     if let ChatEvent::Message { sender, body } = event {
//!         println!("{}: {}", sender, body);
//!     }
//! });
//!
//! manager.connect()?;
//! let mut ticker = tokio::time::interval(Duration::from_millis(100));
//! loop {
//!     ticker.tick().await;
//!     manager.tick(Instant::now());
//! }
//! # }
//! ```

pub mod bus;
pub mod caps;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod line;
pub mod state;
pub mod util;

#[cfg(feature = "tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
pub mod codec;
#[cfg(feature = "tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
pub mod connection;
#[cfg(feature = "tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
pub mod transport;

pub use self::bus::{EventBus, EventHandler, SubscriptionId};
pub use self::caps::{Capability, CapabilityNegotiator, NegotiationStatus};
pub use self::command::Command;
pub use self::config::{ClientConfig, CredentialProvider, Credentials};
pub use self::error::{ClientError, CodecError, LineParseError, Result};
pub use self::event::{ChatEvent, EventChannel};
pub use self::line::{parse_line, ServerLine};
pub use self::state::{ConnectionState, KeepaliveAction, KeepaliveState, ReconnectTimer};

#[cfg(feature = "tokio")]
pub use self::codec::LineCodec;
#[cfg(feature = "tokio")]
pub use self::connection::{ConnectionManager, SendOutcome};
#[cfg(feature = "tokio")]
pub use self::transport::{Connector, TcpConnector};
