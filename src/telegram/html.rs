//! HTML helpers for Telegram message formatting.

use crate::config::{MAX_MESSAGE_LENGTH, TRUNCATED_MESSAGE_LENGTH};

/// Escapes text for Telegram's HTML parse mode.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes text, rendering apostrophes as typographic quotes.
#[must_use]
pub fn escape_pretty(text: &str) -> String {
    escape(text).replace("&#x27;", "’")
}

/// Cuts an over-long message and appends `trailer`.
///
/// Messages within the Telegram limit are returned unchanged.
#[must_use]
pub fn truncate_message(text: String, trailer: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_LENGTH {
        return text;
    }
    let mut cut: String = text.chars().take(TRUNCATED_MESSAGE_LENGTH).collect();
    cut.push_str(trailer);
    cut
}

/// Truncates a string for logging.
#[must_use]
pub fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    }
}
