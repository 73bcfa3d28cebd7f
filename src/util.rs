//! Length limits and UTF-8 safe truncation for outbound text.

/// Maximum length of a received line, tags included.
pub const MAX_LINE_LEN: usize = 8191;

/// Maximum size of a chat message body accepted by the chat servers.
pub const MAX_CHAT_BODY: usize = 500;

/// Truncates a string to at most `max_bytes` bytes without breaking
/// a multi-byte UTF-8 codepoint at the end.
///
/// # Examples
///
/// ```
/// use slirc_tmi::util::truncate_utf8_safe;
///
/// assert_eq!(truncate_utf8_safe("hello world", 5), "hello");
///
/// let emoji = "Hello 👋 World";
/// assert_eq!(truncate_utf8_safe(emoji, 8), "Hello ");
///
/// assert_eq!(truncate_utf8_safe("hi", 10), "hi");
/// ```
#[inline]
pub fn truncate_utf8_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    &s[..end]
}

/// Returns `true` for characters the transport rejects inside a line.
///
/// NUL and every C0/C1 control character except CR and LF are illegal;
/// CR and LF are line delimiters and handled by framing.
#[inline]
pub fn is_illegal_control_char(ch: char) -> bool {
    ch == '\0' || (ch.is_control() && ch != '\r' && ch != '\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_utf8_safe_ascii() {
        assert_eq!(truncate_utf8_safe("hello world", 5), "hello");
        assert_eq!(truncate_utf8_safe("hello", 10), "hello");
        assert_eq!(truncate_utf8_safe("", 5), "");
    }

    #[test]
    fn test_truncate_utf8_safe_multibyte() {
        let s = "café";
        assert_eq!(truncate_utf8_safe(s, 4), "caf");
        assert_eq!(truncate_utf8_safe(s, 5), "café");

        let s = "Hi👋";
        assert_eq!(truncate_utf8_safe(s, 3), "Hi");
        assert_eq!(truncate_utf8_safe(s, 6), "Hi👋");

        assert_eq!(truncate_utf8_safe("日本語", 4), "日");
        assert_eq!(truncate_utf8_safe("hello", 0), "");
    }

    #[test]
    fn test_illegal_control_chars() {
        assert!(is_illegal_control_char('\0'));
        assert!(is_illegal_control_char('\x01'));
        assert!(is_illegal_control_char('\x7f'));
        assert!(!is_illegal_control_char('\r'));
        assert!(!is_illegal_control_char('\n'));
        assert!(!is_illegal_control_char('a'));
        assert!(!is_illegal_control_char('👋'));
    }
}
