//! Error types for the chat client.
//!
//! This module defines the client-level error returned by fallible
//! constructors, the line-framing errors produced by the codec, and the
//! reasons a received line could not be turned into an event.

use thiserror::Error;

/// Convenience type alias for Results using [`ClientError`].
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Top-level client errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// A credential field was empty.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// A credential field contained characters that cannot go on the wire.
    #[error("invalid credential {field}: {reason}")]
    InvalidCredential {
        /// Name of the offending field.
        field: &'static str,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// The connection manager needs a Tokio runtime to spawn its I/O tasks.
    #[error("no tokio runtime available")]
    NoRuntime,
}

/// Errors raised while framing the byte stream into lines.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// I/O error on the underlying stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A line exceeded the configured maximum length.
    #[error("line too long: {actual} bytes (limit {limit})")]
    LineTooLong {
        /// Observed length in bytes.
        actual: usize,
        /// Configured limit.
        limit: usize,
    },

    /// An outbound line contained a line terminator or NUL.
    #[error("illegal control character: {0:?}")]
    IllegalControlChar(char),
}

/// Reasons a recognised protocol line could not be turned into an event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LineParseError {
    /// The line could not be split into tags, prefix, command and params.
    #[error("parsing failed at position {position}: {context}")]
    Tokenize {
        /// Byte offset where tokenizing stopped.
        position: usize,
        /// What was being parsed.
        context: &'static str,
    },

    /// The line has no `:nick!user@host` prefix.
    #[error("missing prefix")]
    MissingPrefix,

    /// The prefix has no `!...@` nick delimiters and no display-name tag.
    #[error("missing sender nick")]
    MissingNick,

    /// The chat command has no `:` trailing body.
    #[error("missing message body")]
    MissingBody,

    /// A membership command named no channel.
    #[error("missing channel")]
    MissingChannel,

    /// The names reply carried no `:` name list.
    #[error("missing names list")]
    MissingNames,
}
