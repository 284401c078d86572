//! Extraction of the user-facing part of a model reply
//!
//! The system instruction asks the model to keep private notes outside a
//! `⸘...⸘` span. Only the first span counts, and a span never crosses a line
//! terminator (`\n`, `\r`, U+2028, U+2029); a reply without one is shown
//! unchanged.

use regex::Regex;
use std::sync::LazyLock;

pub const REPLY_DELIMITER: char = '⸘';

static DELIMITED_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("⸘([^\n\r\u{2028}\u{2029}]*?)⸘").expect("delimiter pattern is valid")
});

/// The visible part of a raw model reply
pub fn visible_text(raw: &str) -> &str {
    DELIMITED_SPAN
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|span| !span.is_empty())
        .unwrap_or(raw)
}
