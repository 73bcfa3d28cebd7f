//! Sender extraction from a `nick!user@host` prefix.

use crate::error::LineParseError;

/// Components of a user prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserPrefix<'a> {
    /// Nickname, before `!`.
    pub nick: &'a str,
    /// Username, between `!` and `@`.
    pub user: &'a str,
    /// Hostname, after `@`.
    pub host: &'a str,
}

impl<'a> UserPrefix<'a> {
    /// Split a raw prefix (without the leading `:`).
    ///
    /// Server prefixes such as `tmi.twitch.tv` carry no `!`/`@` and are
    /// rejected with [`LineParseError::MissingNick`].
    pub fn parse(prefix: &'a str) -> Result<Self, LineParseError> {
        let (nick, rest) = prefix.split_once('!').ok_or(LineParseError::MissingNick)?;
        let (user, host) = rest.split_once('@').ok_or(LineParseError::MissingNick)?;
        if nick.is_empty() {
            return Err(LineParseError::MissingNick);
        }
        Ok(Self { nick, user, host })
    }
}

/// Extract the nick from an optional prefix.
pub fn nick(prefix: Option<&str>) -> Result<&str, LineParseError> {
    let prefix = prefix.ok_or(LineParseError::MissingPrefix)?;
    UserPrefix::parse(prefix).map(|p| p.nick)
}
