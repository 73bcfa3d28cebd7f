//! Minimal chat client
//!
//! Connects to a channel, prints chat and membership events and answers
//! `!ping` with `pong`. Credentials come from the environment:
//!
//! ```text
//! TMI_USERNAME=mybot TMI_TOKEN=oauth:... TMI_CHANNEL=somechannel \
//!     RUST_LOG=slirc_tmi=debug cargo run --example chat_client
//! ```

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use anyhow::Context;
use slirc_tmi::{
    ChatEvent, ClientConfig, ConnectionManager, Credentials, EventChannel, SendOutcome,
};
use tracing_subscriber::EnvFilter;

fn credentials_from_env() -> Option<Credentials> {
    let username = std::env::var("TMI_USERNAME").ok()?;
    let token = std::env::var("TMI_TOKEN").ok()?;
    let channel = std::env::var("TMI_CHANNEL").ok()?;
    Some(Credentials::new(username, token, channel))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let manager = Arc::new(
        ConnectionManager::new(ClientConfig::default(), credentials_from_env)
            .context("creating connection manager")?,
    );

    let bus = manager.events();
    bus.subscribe(EventChannel::Status, |event: &ChatEvent| {
        if let ChatEvent::StatusChanged { state } = event {
            println!("* {}", state);
        }
    });
    bus.subscribe(EventChannel::Confirmed, |_: &ChatEvent| {
        println!("✓ connected");
    });
    bus.subscribe(EventChannel::Membership, |event: &ChatEvent| match event {
        ChatEvent::MembershipChanged { user, joined: true } => println!("→ {} joined", user),
        ChatEvent::MembershipChanged { user, joined: false } => println!("← {} left", user),
        ChatEvent::NamesList { users } => println!("  {} users here", users.len()),
        _ => {}
    });

    let replies: Weak<ConnectionManager> = Arc::downgrade(&manager);
    bus.subscribe(EventChannel::Message, move |event: &ChatEvent| match event {
        ChatEvent::Message { sender, body } => {
            println!("<{}> {}", sender, body);
            if body.trim() == "!ping" {
                if let Some(manager) = replies.upgrade() {
                    if manager.send_chat("pong") != SendOutcome::Sent {
                        eprintln!("reply dropped");
                    }
                }
            }
        }
        ChatEvent::ParseFailure { raw_line, reason } => {
            eprintln!("unparsed ({}): {}", reason, raw_line);
        }
        _ => {}
    });

    manager
        .connect()
        .context("set TMI_USERNAME, TMI_TOKEN and TMI_CHANNEL")?;

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            _ = ticker.tick() => manager.tick(Instant::now()),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    manager.disconnect();
    Ok(())
}
