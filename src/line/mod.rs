//! Line parser: raw protocol text to typed events.
//!
//! [`parse_line`] is a pure function. It tokenizes a line with
//! [`Tokens::parse`] and dispatches on the command in a fixed priority
//! order, first match wins:
//!
//! 1. `PRIVMSG` becomes [`ChatEvent::Message`]
//! 2. `JOIN #...` becomes a joined [`ChatEvent::MembershipChanged`]
//! 3. `PART #...` becomes a parted [`ChatEvent::MembershipChanged`]
//! 4. numeric `353` becomes [`ChatEvent::NamesList`]
//! 5. `PING` becomes [`ServerLine::Ping`] for the connection to answer
//! 6. numeric `001` or the greeting text becomes [`ServerLine::Welcome`]
//! 7. `PONG` and `CAP ACK`/`CAP NAK` are surfaced for the keepalive and
//!    capability bookkeeping
//!
//! Everything else is protocol noise and yields `None`. A recognised
//! command with a missing delimiter yields [`ChatEvent::ParseFailure`];
//! no extraction step ever slices out of range.

pub mod prefix;
pub mod tags;
pub mod tokenizer;

pub use self::tokenizer::Tokens;

use tracing::warn;

use crate::error::LineParseError;
use crate::event::ChatEvent;

/// Greeting text sent by the chat servers once authentication succeeded.
pub const WELCOME_MARKER: &str = "Welcome, GLHF!";

/// Numeric reply carrying the channel member list.
pub const RPL_NAMREPLY: &str = "353";

/// Numeric reply greeting a registered client.
pub const RPL_WELCOME: &str = "001";

/// Commands whose presence makes an untokenizable line worth reporting.
const KNOWN_COMMANDS: &[&str] = &["PRIVMSG", "JOIN", "PART", RPL_NAMREPLY, "PING", "PONG"];

/// The interpretation of one received line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerLine {
    /// An event to publish as-is.
    Event(ChatEvent),
    /// Server keepalive; must be answered with `PONG :<token>`.
    Ping {
        /// Token to echo verbatim.
        token: String,
    },
    /// Reply to our keepalive.
    Pong {
        /// Echoed token, if any.
        token: Option<String>,
    },
    /// Authentication succeeded.
    Welcome,
    /// Capabilities acknowledged by the server.
    CapAck {
        /// Acknowledged capability names.
        caps: Vec<String>,
    },
    /// Capabilities rejected by the server.
    CapNak {
        /// Rejected capability names.
        caps: Vec<String>,
    },
}

/// Parse one raw line.
///
/// # Examples
///
/// ```
/// use slirc_tmi::line::{parse_line, ServerLine};
/// use slirc_tmi::ChatEvent;
///
/// let line = "@display-name=Foo;x=1 :foo!foo@foo.tmi.twitch.tv PRIVMSG #chan :Hello world";
/// assert_eq!(
///     parse_line(line),
///     Some(ServerLine::Event(ChatEvent::Message {
///         sender: "Foo".to_string(),
///         body: "Hello world".to_string(),
///     }))
/// );
/// ```
pub fn parse_line(line: &str) -> Option<ServerLine> {
    let raw = line.trim_end_matches(['\r', '\n']);
    if raw.trim().is_empty() {
        return None;
    }

    let tokens = match Tokens::parse(raw) {
        Ok(tokens) => tokens,
        Err(e) => {
            return KNOWN_COMMANDS
                .iter()
                .any(|cmd| raw.contains(cmd))
                .then(|| failure(raw, e));
        }
    };

    let command = tokens.command;
    let result = if command.eq_ignore_ascii_case("PRIVMSG") {
        chat_message(&tokens).map(ServerLine::Event)
    } else if command.eq_ignore_ascii_case("JOIN") {
        membership(&tokens, true).map(ServerLine::Event)
    } else if command.eq_ignore_ascii_case("PART") {
        membership(&tokens, false).map(ServerLine::Event)
    } else if command == RPL_NAMREPLY {
        names_list(&tokens).map(ServerLine::Event)
    } else if command.eq_ignore_ascii_case("PING") {
        Ok(ServerLine::Ping {
            token: last_argument(&tokens).unwrap_or_default().to_string(),
        })
    } else if command == RPL_WELCOME || tokens.trailing.is_some_and(|t| t.contains(WELCOME_MARKER)) {
        Ok(ServerLine::Welcome)
    } else if command.eq_ignore_ascii_case("PONG") {
        Ok(ServerLine::Pong {
            token: last_argument(&tokens).map(str::to_string),
        })
    } else if command.eq_ignore_ascii_case("CAP") {
        return capability_reply(&tokens);
    } else {
        return None;
    };

    Some(result.unwrap_or_else(|e| failure(raw, e)))
}

fn failure(raw: &str, reason: LineParseError) -> ServerLine {
    warn!(line = raw, %reason, "unparseable line");
    ServerLine::Event(ChatEvent::ParseFailure {
        raw_line: raw.to_string(),
        reason: reason.to_string(),
    })
}

/// Trailing parameter, or the last middle parameter when there is none.
fn last_argument<'a>(tokens: &Tokens<'a>) -> Option<&'a str> {
    tokens.trailing.or_else(|| tokens.params.last().copied())
}

/// Sender: display-name tag first, then the prefix nick.
fn sender(tokens: &Tokens<'_>) -> Result<String, LineParseError> {
    if let Some(name) = tokens.tags.and_then(tags::display_name) {
        return Ok(name.into_owned());
    }
    prefix::nick(tokens.prefix).map(str::to_string)
}

fn chat_message(tokens: &Tokens<'_>) -> Result<ChatEvent, LineParseError> {
    let body = tokens.trailing.ok_or(LineParseError::MissingBody)?;
    let sender = sender(tokens)?;
    Ok(ChatEvent::Message {
        sender,
        body: body.to_string(),
    })
}

fn membership(tokens: &Tokens<'_>, joined: bool) -> Result<ChatEvent, LineParseError> {
    let channel = tokens.target().or(tokens.trailing).unwrap_or_default();
    if !channel.starts_with('#') {
        return Err(LineParseError::MissingChannel);
    }
    let user = prefix::nick(tokens.prefix)?;
    Ok(ChatEvent::MembershipChanged {
        user: user.to_string(),
        joined,
    })
}

fn names_list(tokens: &Tokens<'_>) -> Result<ChatEvent, LineParseError> {
    let names = tokens.trailing.ok_or(LineParseError::MissingNames)?;
    let users = names
        .split(' ')
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect();
    Ok(ChatEvent::NamesList { users })
}

fn capability_reply(tokens: &Tokens<'_>) -> Option<ServerLine> {
    let subcommand = tokens.params.get(1)?;
    let caps = last_argument(tokens)
        .filter(|_| tokens.trailing.is_some() || tokens.params.len() > 2)
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    if subcommand.eq_ignore_ascii_case("ACK") {
        Some(ServerLine::CapAck { caps })
    } else if subcommand.eq_ignore_ascii_case("NAK") {
        Some(ServerLine::CapNak { caps })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(line: &str) -> ChatEvent {
        match parse_line(line) {
            Some(ServerLine::Event(e)) => e,
            other => panic!("expected event for {:?}, got {:?}", line, other),
        }
    }

    fn assert_failure(line: &str, reason: LineParseError) {
        match event(line) {
            ChatEvent::ParseFailure { raw_line, reason: r } => {
                assert_eq!(raw_line, line);
                assert_eq!(r, reason.to_string());
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_privmsg_with_display_name() {
        let e = event("@display-name=Foo;x=1 :foo!foo@foo.tmi.twitch.tv PRIVMSG #chan :Hello world");
        assert_eq!(
            e,
            ChatEvent::Message {
                sender: "Foo".into(),
                body: "Hello world".into()
            }
        );
    }

    #[test]
    fn test_privmsg_falls_back_to_nick() {
        let e = event(":nick!user@host PRIVMSG #chan :hi there");
        assert_eq!(
            e,
            ChatEvent::Message {
                sender: "nick".into(),
                body: "hi there".into()
            }
        );

        let e = event("@display-name=;color= :nick!user@host PRIVMSG #chan :x");
        assert!(matches!(e, ChatEvent::Message { sender, .. } if sender == "nick"));
    }

    #[test]
    fn test_privmsg_body_keeps_command_words() {
        let e = event(":a!a@a PRIVMSG #c :JOIN #other PING :x");
        assert!(matches!(e, ChatEvent::Message { body, .. } if body == "JOIN #other PING :x"));
    }

    #[test]
    fn test_privmsg_missing_delimiters() {
        assert_failure(":nick!user@host PRIVMSG #chan", LineParseError::MissingBody);
        assert_failure("PRIVMSG #chan :orphan", LineParseError::MissingPrefix);
        assert_failure(":tmi.twitch.tv PRIVMSG #chan :hi", LineParseError::MissingNick);
    }

    #[test]
    fn test_join_and_part() {
        assert_eq!(
            event(":nick!user@host JOIN #chan"),
            ChatEvent::MembershipChanged {
                user: "nick".into(),
                joined: true
            }
        );
        assert_eq!(
            event(":nick!nick@nick.tmi.twitch.tv PART #chan"),
            ChatEvent::MembershipChanged {
                user: "nick".into(),
                joined: false
            }
        );
    }

    #[test]
    fn test_join_without_channel_or_prefix() {
        assert_failure(":nick!user@host JOIN", LineParseError::MissingChannel);
        assert_failure("JOIN #chan", LineParseError::MissingPrefix);
    }

    #[test]
    fn test_names_list() {
        let e = event(":me.tmi.twitch.tv 353 me = #chan :alice bob carol");
        assert_eq!(
            e,
            ChatEvent::NamesList {
                users: vec!["alice".into(), "bob".into(), "carol".into()]
            }
        );
        assert_failure(":me.tmi.twitch.tv 353 me = #chan", LineParseError::MissingNames);
    }

    #[test]
    fn test_ping() {
        assert_eq!(
            parse_line("PING :tmi.twitch.tv"),
            Some(ServerLine::Ping {
                token: "tmi.twitch.tv".into()
            })
        );
        assert_eq!(
            parse_line("PING token"),
            Some(ServerLine::Ping {
                token: "token".into()
            })
        );
    }

    #[test]
    fn test_welcome() {
        assert_eq!(
            parse_line(":tmi.twitch.tv 001 me :Welcome, GLHF!"),
            Some(ServerLine::Welcome)
        );
        assert_eq!(
            parse_line(":tmi.twitch.tv 002 me :Welcome, GLHF!"),
            Some(ServerLine::Welcome)
        );
    }

    #[test]
    fn test_pong() {
        assert_eq!(
            parse_line(":tmi.twitch.tv PONG tmi.twitch.tv :irc.chat.twitch.tv"),
            Some(ServerLine::Pong {
                token: Some("irc.chat.twitch.tv".into())
            })
        );
    }

    #[test]
    fn test_cap_ack_and_nak() {
        assert_eq!(
            parse_line(":tmi.twitch.tv CAP * ACK :twitch.tv/membership twitch.tv/tags"),
            Some(ServerLine::CapAck {
                caps: vec!["twitch.tv/membership".into(), "twitch.tv/tags".into()]
            })
        );
        assert_eq!(
            parse_line(":tmi.twitch.tv CAP * NAK :twitch.tv/bogus"),
            Some(ServerLine::CapNak {
                caps: vec!["twitch.tv/bogus".into()]
            })
        );
        assert_eq!(parse_line(":tmi.twitch.tv CAP * LS :a b"), None);
    }

    #[test]
    fn test_noise_is_ignored() {
        assert_eq!(parse_line(":tmi.twitch.tv 372 me :You are in a maze"), None);
        assert_eq!(parse_line("@room-id=1 :tmi.twitch.tv ROOMSTATE #chan"), None);
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("\r\n"), None);
        assert_eq!(parse_line("@@@"), None);
    }

    #[test]
    fn test_untokenizable_known_command_is_failure() {
        let line = "@display-name=Foo;PRIVMSG";
        match event(line) {
            ChatEvent::ParseFailure { raw_line, .. } => assert_eq!(raw_line, line),
            other => panic!("unexpected {:?}", other),
        }
    }
}
