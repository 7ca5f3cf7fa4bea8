//! Format detection for raw transcripts.
//!
//! Detectors run in a fixed priority order and the first match wins. There is no
//! confidence scoring: the same input always maps to the same tag.

use super::heuristics::{CONVERSATION_LABEL_REGEX, HEADER_REGEX, SAID_MARKER_REGEX};
use super::types::FormatTag;

type Detector = fn(&str) -> bool;

/// Detectors in priority order. `Generic` is the implicit last resort.
const DETECTORS: &[(FormatTag, Detector)] = &[
    (FormatTag::Structured, looks_structured),
    (FormatTag::SaidFormat, has_said_markers),
    (FormatTag::Headered, has_role_headers),
    (FormatTag::Conversation, has_conversation_labels),
];

/// Classifies raw transcript text into a `FormatTag`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormatDetector;

impl FormatDetector {
    pub fn new() -> Self {
        Self
    }

    /// Detect the format of `text`.
    pub fn detect(&self, text: &str) -> FormatTag {
        DETECTORS
            .iter()
            .find(|(_, detector)| detector(text))
            .map(|(tag, _)| *tag)
            .unwrap_or(FormatTag::Generic)
    }
}

fn looks_structured(text: &str) -> bool {
    let trimmed = text.trim();
    (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
}

fn has_said_markers(text: &str) -> bool {
    SAID_MARKER_REGEX.is_match(text)
}

fn has_role_headers(text: &str) -> bool {
    HEADER_REGEX.is_match(text)
}

fn has_conversation_labels(text: &str) -> bool {
    CONVERSATION_LABEL_REGEX.is_match(text)
}
