//! IRCv3 message tag lookup and unescaping.
//!
//! Tags arrive as `key=value;key2=value2` with values escaped per the
//! message-tags extension. Only lookups are needed on the client side.

use std::borrow::Cow;

/// Tag carrying the human-readable sender name.
pub const DISPLAY_NAME: &str = "display-name";

/// Iterate over `(key, raw_value)` pairs of a raw tags section.
///
/// A tag without `=` yields an empty value.
pub fn iter_tags(tags: &str) -> impl Iterator<Item = (&str, &str)> {
    tags.split(';')
        .filter(|t| !t.is_empty())
        .map(|t| t.split_once('=').unwrap_or((t, "")))
}

/// Look up a tag by key and return its unescaped value.
///
/// Returns `None` when the key is absent. The first occurrence wins.
pub fn tag_value<'a>(tags: &'a str, key: &str) -> Option<Cow<'a, str>> {
    iter_tags(tags)
        .find(|(k, _)| *k == key)
        .map(|(_, v)| unescape_tag_value(v))
}

/// The `display-name` tag, if present and non-empty.
pub fn display_name(tags: &str) -> Option<Cow<'_, str>> {
    tag_value(tags, DISPLAY_NAME).filter(|name| !name.trim().is_empty())
}

/// Unescape a tag value from wire format.
///
/// Borrows when the value contains no escapes.
pub fn unescape_tag_value(value: &str) -> Cow<'_, str> {
    if !value.contains('\\') {
        return Cow::Borrowed(value);
    }

    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        let r = if c == '\\' {
            match iter.next() {
                Some(':') => ';',
                Some('s') => ' ',
                Some('\\') => '\\',
                Some('r') => '\r',
                Some('n') => '\n',
                Some(c) => c,
                None => break,
            }
        } else {
            c
        };
        unescaped.push(r);
    }
    Cow::Owned(unescaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_value_lookup() {
        let tags = "badge-info=;badges=broadcaster/1;color=#FF0000;display-name=Foo;emotes=";
        assert_eq!(tag_value(tags, "color").as_deref(), Some("#FF0000"));
        assert_eq!(tag_value(tags, "badge-info").as_deref(), Some(""));
        assert_eq!(tag_value(tags, "missing"), None);
    }

    #[test]
    fn test_display_name_last_tag() {
        assert_eq!(display_name("x=1;display-name=Bar").as_deref(), Some("Bar"));
    }

    #[test]
    fn test_display_name_empty_is_absent() {
        assert_eq!(display_name("display-name=;x=1"), None);
        assert_eq!(display_name("x=1"), None);
    }

    #[test]
    fn test_display_name_unescaped() {
        assert_eq!(
            display_name("display-name=Some\\sName").as_deref(),
            Some("Some Name")
        );
    }

    #[test]
    fn test_key_must_match_exactly() {
        assert_eq!(display_name("my-display-name=Nope;x=1"), None);
    }

    #[test]
    fn test_unescape_sequences() {
        assert_eq!(unescape_tag_value("a\\:b"), "a;b");
        assert_eq!(unescape_tag_value("hello\\sworld"), "hello world");
        assert_eq!(unescape_tag_value("path\\\\file"), "path\\file");
        assert_eq!(unescape_tag_value("line\\rend\\n"), "line\rend\n");
        assert_eq!(unescape_tag_value("test\\"), "test");
        assert_eq!(unescape_tag_value("a\\xb"), "axb");
    }

    #[test]
    fn test_unescape_borrows_plain_values() {
        assert!(matches!(unescape_tag_value("plain"), Cow::Borrowed("plain")));
    }
}
