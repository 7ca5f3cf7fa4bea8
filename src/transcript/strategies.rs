//! Extraction strategies, one per format tag.
//!
//! Each strategy is a pure `text -> turns` function. A strategy that yields
//! no turns is treated as not applicable and the caller falls back to
//! [`GenericStrategy`].

use super::generic::GenericStrategy;
use super::heuristics::{CONVERSATION_LABELS, HEADER_REGEX, SAID_MARKER_REGEX};
use super::types::{FormatTag, Role, Turn};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

/// Object keys that may hold the list of message records.
const RECORD_LIST_KEYS: &[&str] = &["messages", "conversation", "chat", "dialogue", "transcript"];

/// Record keys that may hold the speaker, in lookup order.
const ROLE_KEYS: &[&str] = &["role", "speaker", "author"];

/// Record keys that may hold the message text, in lookup order.
const CONTENT_KEYS: &[&str] = &["content", "text", "message"];

static CONVERSATION_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^[ \t]*({}):[ \t]?(.*)$",
        CONVERSATION_LABELS.join("|")
    ))
    .expect("conversation line pattern is valid")
});

/// A text-to-turns extraction strategy for one transcript convention.
pub trait ParserStrategy: Send + Sync {
    /// The format this strategy handles.
    fn tag(&self) -> FormatTag;

    /// Extract turns in transcript order. Empty means "not applicable".
    fn extract(&self, text: &str) -> Vec<Turn>;
}

/// Look up the strategy for a detected format tag.
pub fn strategy_for(tag: FormatTag) -> &'static dyn ParserStrategy {
    match tag {
        FormatTag::Structured => &StructuredStrategy,
        FormatTag::SaidFormat => &SaidStrategy,
        FormatTag::Headered => &HeaderedStrategy,
        FormatTag::Conversation => &ConversationStrategy,
        FormatTag::Generic => &GenericStrategy,
    }
}

/// JSON exports: a list of records, or an object wrapping one.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredStrategy;

impl ParserStrategy for StructuredStrategy {
    fn tag(&self) -> FormatTag {
        FormatTag::Structured
    }

    fn extract(&self, text: &str) -> Vec<Turn> {
        let value: Value = match serde_json::from_str(text.trim()) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "structured input is malformed");
                return Vec::new();
            }
        };

        record_list(&value)
            .map(|records| records.iter().filter_map(record_to_turn).collect())
            .unwrap_or_default()
    }
}

fn record_list(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(records) => Some(records),
        Value::Object(map) => RECORD_LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array)),
        _ => None,
    }
}

fn record_to_turn(record: &Value) -> Option<Turn> {
    let obj = record.as_object()?;

    let role = ROLE_KEYS
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(Role::from_name)
        .unwrap_or(Role::Unknown);

    let content = CONTENT_KEYS
        .iter()
        .find_map(|key| obj.get(*key).and_then(content_text))?;

    if content.trim().is_empty() {
        return None;
    }
    Some(Turn::new(role, content))
}

/// Plain strings, or OpenAI-style arrays of `{"type": "text", "text": ...}` parts.
fn content_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(s) => Some(s.as_str()),
                    Value::Object(obj) => obj.get("text").and_then(Value::as_str),
                    _ => None,
                })
                .collect();
            (!texts.is_empty()).then(|| texts.join("\n"))
        }
        _ => None,
    }
}

/// `You said:` / `ChatGPT said:` exports.
#[derive(Debug, Default, Clone, Copy)]
pub struct SaidStrategy;

impl ParserStrategy for SaidStrategy {
    fn tag(&self) -> FormatTag {
        FormatTag::SaidFormat
    }

    fn extract(&self, text: &str) -> Vec<Turn> {
        let markers: Vec<(usize, usize, Role)> = SAID_MARKER_REGEX
            .captures_iter(text)
            .filter_map(|cap| {
                let whole = cap.get(0)?;
                let speaker = cap.get(1)?.as_str();
                let role = if speaker.eq_ignore_ascii_case("you") {
                    Role::User
                } else {
                    Role::Assistant
                };
                Some((whole.start(), whole.end(), role))
            })
            .collect();

        split_at_markers(text, &markers)
    }
}

/// Markdown exports with one role header per turn.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderedStrategy;

impl ParserStrategy for HeaderedStrategy {
    fn tag(&self) -> FormatTag {
        FormatTag::Headered
    }

    fn extract(&self, text: &str) -> Vec<Turn> {
        let markers: Vec<(usize, usize, Role)> = HEADER_REGEX
            .captures_iter(text)
            .filter_map(|cap| {
                let whole = cap.get(0)?;
                let title = cap.get(1)?.as_str();
                Some((whole.start(), whole.end(), Role::from_name(title)))
            })
            .collect();

        split_at_markers(text, &markers)
    }
}

/// Split `text` into turns at `(start, end, role)` markers.
///
/// Each turn runs from the end of its marker to the start of the next one.
/// Text before the first marker becomes a leading user turn.
fn split_at_markers(text: &str, markers: &[(usize, usize, Role)]) -> Vec<Turn> {
    let Some(&(first_start, _, _)) = markers.first() else {
        return Vec::new();
    };

    let mut turns = Vec::with_capacity(markers.len() + 1);

    let preamble = text[..first_start].trim();
    if !preamble.is_empty() {
        turns.push(Turn::user(preamble));
    }

    for (i, &(_, end, role)) in markers.iter().enumerate() {
        let next = markers.get(i + 1).map_or(text.len(), |&(start, _, _)| start);
        turns.push(Turn::new(role, text[end..next].trim()));
    }

    turns
}

/// `User:` / `AI:` line-prefixed logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConversationStrategy;

impl ParserStrategy for ConversationStrategy {
    fn tag(&self) -> FormatTag {
        FormatTag::Conversation
    }

    fn extract(&self, text: &str) -> Vec<Turn> {
        let mut turns = Vec::new();
        let mut role = Role::User;
        let mut buffer: Vec<&str> = Vec::new();

        let mut flush = |role: Role, buffer: &mut Vec<&str>| {
            let content = buffer.join("\n");
            let content = content.trim();
            if !content.is_empty() {
                turns.push(Turn::new(role, content));
            }
            buffer.clear();
        };

        for line in text.lines() {
            if let Some(cap) = CONVERSATION_LINE_REGEX.captures(line) {
                flush(role, &mut buffer);
                role = cap.get(1).map_or(Role::Unknown, |m| Role::from_name(m.as_str()));
                if let Some(rest) = cap.get(2) {
                    buffer.push(rest.as_str());
                }
            } else {
                buffer.push(line);
            }
        }
        flush(role, &mut buffer);

        turns
    }
}
