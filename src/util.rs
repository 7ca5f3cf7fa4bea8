//! Shared string helpers for the chatdigest crate.

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The first `max_chars` characters of `text`, with `...` appended when cut.
///
/// Counts characters, not bytes, so multi-byte text never splits mid-codepoint.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
