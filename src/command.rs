//! Outbound protocol commands.
//!
//! Only the handful of commands the client ever sends are modelled. Each
//! serializes through [`Display`](fmt::Display) to a single line without
//! the terminator; the codec appends CRLF.

use std::borrow::Cow;
use std::fmt::{self, Write};

use crate::caps::Capability;
use crate::util::{truncate_utf8_safe, MAX_CHAT_BODY};

/// A command sent to the chat server.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Command {
    /// `PASS <token>`
    Pass(String),
    /// `NICK <username>`
    Nick(String),
    /// `USER <username> 8 *:<username>`
    User(String),
    /// `JOIN #<channel>`
    Join(String),
    /// `PART #<channel>`
    Part(String),
    /// `CAP REQ :<caps>`
    CapReq(Vec<Capability>),
    /// `PING <host>`
    Ping(String),
    /// `PONG :<token>`
    Pong(String),
    /// `PRIVMSG #<channel> :<text>`
    Privmsg {
        /// Channel without `#`.
        channel: String,
        /// Message text; line terminators are neutralised on output.
        text: String,
    },
}

impl Command {
    /// Build a chat message, sanitised and cut to the chat body limit.
    pub fn privmsg(channel: impl Into<String>, text: &str) -> Self {
        let clean = sanitize_text(text);
        Command::Privmsg {
            channel: channel.into(),
            text: truncate_utf8_safe(&clean, MAX_CHAT_BODY).to_string(),
        }
    }

    /// The serialized line with secrets masked, for logging.
    pub fn redacted(&self) -> Cow<'_, str> {
        match self {
            Command::Pass(_) => Cow::Borrowed("PASS ***"),
            other => Cow::Owned(other.to_string()),
        }
    }
}

/// Make chat text safe to embed as a trailing parameter.
///
/// NUL is removed and each CR or LF becomes a space, so the text can never
/// end the line early or smuggle a second command.
///
/// # Examples
///
/// ```
/// use slirc_tmi::command::sanitize_text;
///
/// assert_eq!(sanitize_text("hi\r\nQUIT"), "hi  QUIT");
/// assert_eq!(sanitize_text("me@example"), "me@example");
/// ```
pub fn sanitize_text(text: &str) -> Cow<'_, str> {
    if !text.contains(['\r', '\n', '\0']) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .filter(|&c| c != '\0')
            .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
            .collect(),
    )
}

/// Write a command with a freeform (always colon-prefixed) trailing argument.
fn write_cmd_freeform(f: &mut fmt::Formatter<'_>, cmd: &str, args: &[&str]) -> fmt::Result {
    match args.split_last() {
        Some((suffix, middle)) => {
            f.write_str(cmd)?;
            for arg in middle {
                f.write_char(' ')?;
                f.write_str(arg)?;
            }
            f.write_str(" :")?;
            f.write_str(&sanitize_text(suffix))
        }
        None => f.write_str(cmd),
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Pass(token) => write!(f, "PASS {}", token),
            Command::Nick(nick) => write!(f, "NICK {}", nick),
            Command::User(user) => write!(f, "USER {} 8 *:{}", user, user),
            Command::Join(channel) => write!(f, "JOIN #{}", channel),
            Command::Part(channel) => write!(f, "PART #{}", channel),
            Command::CapReq(caps) => {
                let list = caps
                    .iter()
                    .map(AsRef::as_ref)
                    .collect::<Vec<&str>>()
                    .join(" ");
                write_cmd_freeform(f, "CAP", &["REQ", list.as_str()])
            }
            Command::Ping(host) => write!(f, "PING {}", host),
            Command::Pong(token) if token.is_empty() => f.write_str("PONG"),
            Command::Pong(token) => write_cmd_freeform(f, "PONG", &[token.as_str()]),
            Command::Privmsg { channel, text } => {
                let target = format!("#{}", channel);
                write_cmd_freeform(f, "PRIVMSG", &[target.as_str(), text.as_str()])
            }
        }
    }
}
