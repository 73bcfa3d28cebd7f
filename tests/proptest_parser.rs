//! Property-based tests for the line parser.
//!
//! Uses proptest to generate protocol lines and verify that:
//! 1. Parsing never panics, whatever the input
//! 2. Tagged chat messages yield the display name and body exactly
//! 3. Names replies keep server order
//! 4. Outbound chat can never carry a line terminator

use proptest::prelude::*;
use slirc_tmi::{parse_line, ChatEvent, Command, ServerLine};

// =============================================================================
// STRATEGIES
// =============================================================================

/// Login names: lowercase letters, digits and underscore.
fn login_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9_]{1,25}").expect("valid regex")
}

/// Display names as the servers send them (no tag-escaped characters).
fn display_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9_]{1,25}").expect("valid regex")
}

/// Channel names without the `#`.
fn channel_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9_]{1,25}").expect("valid regex")
}

/// Chat text free of line terminators.
fn body_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[^\r\n\0]{0,400}").expect("valid regex")
}

/// Extra tags that may sit around `display-name`.
fn other_tags_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(
        (
            prop::string::string_regex("[a-z][a-z0-9\\-]{0,15}").expect("valid regex"),
            prop::string::string_regex("[A-Za-z0-9/#,.\\-]{0,20}").expect("valid regex"),
        )
            .prop_filter("not display-name", |(k, _)| k != "display-name"),
        0..6,
    )
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn parse_never_panics(line in "\\PC{0,600}") {
        let _ = parse_line(&line);
    }

    #[test]
    fn parse_never_panics_on_protocol_like_input(
        line in "[@:!#; a-zA-Z0-9=]{0,120}(PRIVMSG|JOIN|PART|353|PING|PONG)?[ :#a-z!@]{0,40}"
    ) {
        let _ = parse_line(&line);
    }

    #[test]
    fn tagged_privmsg_yields_display_name_and_body(
        name in display_name_strategy(),
        login in login_strategy(),
        channel in channel_strategy(),
        body in body_strategy(),
        before in other_tags_strategy(),
        after in other_tags_strategy(),
    ) {
        let mut tags: Vec<String> = before.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        tags.push(format!("display-name={}", name));
        tags.extend(after.iter().map(|(k, v)| format!("{}={}", k, v)));

        let line = format!(
            "@{} :{}!{}@{}.tmi.twitch.tv PRIVMSG #{} :{}",
            tags.join(";"), login, login, login, channel, body
        );
        prop_assert_eq!(
            parse_line(&line),
            Some(ServerLine::Event(ChatEvent::Message { sender: name, body }))
        );
    }

    #[test]
    fn untagged_privmsg_yields_nick(
        login in login_strategy(),
        channel in channel_strategy(),
        body in body_strategy(),
    ) {
        let line = format!(":{}!{}@{}.tmi.twitch.tv PRIVMSG #{} :{}", login, login, login, channel, body);
        prop_assert_eq!(
            parse_line(&line),
            Some(ServerLine::Event(ChatEvent::Message { sender: login, body }))
        );
    }

    #[test]
    fn names_reply_keeps_order(
        me in login_strategy(),
        channel in channel_strategy(),
        users in prop::collection::vec(login_strategy(), 1..40),
    ) {
        let line = format!(":{}.tmi.twitch.tv 353 {} = #{} :{}", me, me, channel, users.join(" "));
        prop_assert_eq!(
            parse_line(&line),
            Some(ServerLine::Event(ChatEvent::NamesList { users }))
        );
    }

    #[test]
    fn ping_token_echoed_verbatim(token in "[A-Za-z0-9.:_\\-]{1,64}") {
        let parsed = parse_line(&format!("PING :{}", token));
        prop_assert_eq!(parsed, Some(ServerLine::Ping { token: token.clone() }));
        prop_assert_eq!(Command::Pong(token.clone()).to_string(), format!("PONG :{}", token));
    }

    #[test]
    fn outbound_chat_is_one_line(channel in channel_strategy(), text in "\\PC{0,700}|[a\r\n\0]{0,50}") {
        let line = Command::privmsg(channel.as_str(), &text).to_string();
        prop_assert!(!line.contains(['\r', '\n', '\0']));
        let prefix = format!("PRIVMSG #{} :", channel);
        prop_assert!(line.starts_with(&prefix));
    }
}
