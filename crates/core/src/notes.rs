//! Speaker notes filtering.

use regex::Regex;
use std::sync::LazyLock;

/// Regex matching URL-like substrings.
static LINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(https?://|www\.)\S+").unwrap());

fn count_non_whitespace_chars(s: &str) -> usize {
    s.chars().filter(|c| !c.is_whitespace()).count()
}

/// Share of non-whitespace characters left after removing links, from 0 to 1.
///
/// Returns `None` for text with no visible characters.
pub fn prose_ratio(text: &str) -> Option<f64> {
    let total = count_non_whitespace_chars(text);
    if total == 0 {
        return None;
    }
    let cleaned = LINK_REGEX.replace_all(text, "");
    Some(count_non_whitespace_chars(&cleaned) as f64 / total as f64)
}

/// Whether notes are worth emitting: not blank and not mostly links.
pub fn should_emit_notes(text: &str, min_prose_ratio: f64) -> bool {
    match prose_ratio(text) {
        Some(ratio) => ratio >= min_prose_ratio,
        None => false,
    }
}
