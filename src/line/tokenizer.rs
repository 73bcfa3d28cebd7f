//! Nom-based tokenizer for raw protocol lines.
//!
//! Splits a line into its tags, prefix, command and parameters without
//! copying. Semantic interpretation happens in [`super::parse_line`].

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::{context, VerboseError, VerboseErrorKind},
    sequence::preceded,
    IResult,
};

use crate::error::LineParseError;

type ParseResult<I, O> = IResult<I, O, VerboseError<I>>;

/// Parse IRCv3 message tags (the part after `@` and before the first space).
fn parse_tags(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing message tags",
        preceded(char('@'), take_until(" ")),
    )(input)
}

/// Parse message prefix (the part after `:` and before the first space).
fn parse_prefix(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing message prefix",
        preceded(char(':'), take_while1(|c| c != ' ')),
    )(input)
}

/// Parse the command name: a word or a three-digit numeric.
fn parse_command(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing command",
        take_while1(|c: char| c.is_ascii_alphanumeric()),
    )(input)
}

/// A tokenized line with borrowed slices into the original input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens<'a> {
    /// Raw tags string without the leading `@`.
    pub tags: Option<&'a str>,
    /// Raw prefix without the leading `:`.
    pub prefix: Option<&'a str>,
    /// The command word or numeric.
    pub command: &'a str,
    /// Middle parameters, in order.
    pub params: Vec<&'a str>,
    /// Trailing parameter (text after ` :`), if present.
    pub trailing: Option<&'a str>,
}

impl<'a> Tokens<'a> {
    /// Tokenize a single line. Trailing CR/LF is ignored.
    pub fn parse(input: &'a str) -> Result<Self, LineParseError> {
        let line = input.trim_end_matches(['\r', '\n']);
        match tokenize(line) {
            Ok((_rest, tokens)) => Ok(tokens),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let mut position = line.len();
                let mut ctx = "tokenizing line";
                for (remaining, kind) in &e.errors {
                    position = line.len() - remaining.len();
                    if let VerboseErrorKind::Context(c) = kind {
                        ctx = *c;
                    }
                }
                Err(LineParseError::Tokenize {
                    position,
                    context: ctx,
                })
            }
            Err(nom::Err::Incomplete(_)) => Err(LineParseError::Tokenize {
                position: line.len(),
                context: "incomplete input",
            }),
        }
    }

    /// First middle parameter, the target of most commands.
    pub fn target(&self) -> Option<&'a str> {
        self.params.first().copied()
    }
}

fn tokenize(input: &str) -> ParseResult<&str, Tokens<'_>> {
    let (input, tags) = context("parsing optional tags", opt(parse_tags))(input)?;
    let (input, _) = space0(input)?;

    let (input, prefix) = context("parsing optional prefix", opt(parse_prefix))(input)?;
    let (input, _) = space0(input)?;

    let (input, command) = context("parsing required command", parse_command)(input)?;

    let mut params = Vec::new();
    let mut trailing = None;
    let mut rest = input;

    while let Some(after_space) = rest.strip_prefix(' ') {
        rest = after_space;
        if let Some(text) = rest.strip_prefix(':') {
            trailing = Some(text);
            rest = "";
            break;
        }
        let end = rest.find(' ').unwrap_or(rest.len());
        let param = &rest[..end];
        if !param.is_empty() {
            params.push(param);
        }
        rest = &rest[end..];
    }

    Ok((
        rest,
        Tokens {
            tags,
            prefix,
            command,
            params,
            trailing,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_command() {
        let t = Tokens::parse("PING").unwrap();
        assert_eq!(t.command, "PING");
        assert!(t.tags.is_none());
        assert!(t.prefix.is_none());
        assert!(t.params.is_empty());
        assert!(t.trailing.is_none());
    }

    #[test]
    fn test_parse_with_prefix_and_trailing() {
        let t = Tokens::parse(":nick!user@host PRIVMSG #channel :Hello, world!").unwrap();
        assert_eq!(t.prefix, Some("nick!user@host"));
        assert_eq!(t.command, "PRIVMSG");
        assert_eq!(t.params, vec!["#channel"]);
        assert_eq!(t.trailing, Some("Hello, world!"));
        assert_eq!(t.target(), Some("#channel"));
    }

    #[test]
    fn test_parse_with_tags() {
        let t = Tokens::parse("@badges=;display-name=Foo :foo!foo@foo PRIVMSG #ch :Hi").unwrap();
        assert_eq!(t.tags, Some("badges=;display-name=Foo"));
        assert_eq!(t.prefix, Some("foo!foo@foo"));
        assert_eq!(t.trailing, Some("Hi"));
    }

    #[test]
    fn test_parse_with_crlf() {
        let t = Tokens::parse("PING :tmi.twitch.tv\r\n").unwrap();
        assert_eq!(t.command, "PING");
        assert_eq!(t.trailing, Some("tmi.twitch.tv"));
    }

    #[test]
    fn test_parse_numeric_names_reply() {
        let t = Tokens::parse(":me.tmi.twitch.tv 353 me = #chan :alice bob").unwrap();
        assert_eq!(t.command, "353");
        assert_eq!(t.params, vec!["me", "=", "#chan"]);
        assert_eq!(t.trailing, Some("alice bob"));
    }

    #[test]
    fn test_parse_empty_trailing() {
        let t = Tokens::parse("PRIVMSG #channel :").unwrap();
        assert_eq!(t.trailing, Some(""));
    }

    #[test]
    fn test_trailing_keeps_inner_colons() {
        let t = Tokens::parse(":a!a@a PRIVMSG #c :see: http://x").unwrap();
        assert_eq!(t.trailing, Some("see: http://x"));
    }

    #[test]
    fn test_tags_without_following_space_fail() {
        let err = Tokens::parse("@display-name=Foo").unwrap_err();
        assert!(matches!(err, LineParseError::Tokenize { .. }));
    }

    #[test]
    fn test_missing_command_reports_position() {
        match Tokens::parse(":prefix.only ") {
            Err(LineParseError::Tokenize { position, context }) => {
                assert_eq!(position, 13);
                assert_eq!(context, "parsing required command");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
