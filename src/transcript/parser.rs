//! Entry point turning raw transcript text into a `ParsedTranscript`.

use super::detect::FormatDetector;
use super::generic::GenericStrategy;
use super::strategies::{ParserStrategy, strategy_for};
use super::types::{FormatTag, ParsedTranscript, Turn};
use crate::tokens::{TokenCounter, TokenEstimator};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::debug;

/// Detects the format of a transcript and extracts its turns.
///
/// Parsing never fails: an unrecognized or malformed input degrades to the
/// generic heuristic parser, which always yields at least one turn.
#[derive(Clone)]
pub struct TranscriptParser {
    detector: FormatDetector,
    estimator: Arc<dyn TokenEstimator>,
}

impl TranscriptParser {
    pub fn new(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self {
            detector: FormatDetector::new(),
            estimator,
        }
    }

    /// Parse `raw` into ordered turns.
    ///
    /// `raw_text` on the result is the input verbatim; detection and
    /// extraction run on a copy with `\r\n` line endings normalized.
    pub fn parse(&self, raw: &str) -> ParsedTranscript {
        let text = normalize_newlines(raw);
        let detected = self.detector.detect(&text);
        let (turns, format_tag) = extract_with_fallback(&text, detected);
        let estimated_tokens = self.estimator.estimate(&text, None);

        debug!(
            %detected,
            %format_tag,
            turns = turns.len(),
            estimated_tokens,
            "parsed transcript"
        );

        ParsedTranscript::new(turns, format_tag, raw, estimated_tokens)
    }
}

impl Default for TranscriptParser {
    fn default() -> Self {
        Self::new(Arc::new(TokenCounter::new()))
    }
}

impl std::fmt::Debug for TranscriptParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptParser")
            .field("detector", &self.detector)
            .finish_non_exhaustive()
    }
}

fn normalize_newlines(raw: &str) -> Cow<'_, str> {
    if raw.contains('\r') {
        Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(raw)
    }
}

/// Run the strategy for `tag`, falling back to the generic parser when it
/// yields nothing. Returns the tag of the strategy that produced the turns.
fn extract_with_fallback(text: &str, tag: FormatTag) -> (Vec<Turn>, FormatTag) {
    let strategy = strategy_for(tag);
    let turns = strategy.extract(text);
    if !turns.is_empty() {
        return (turns, strategy.tag());
    }

    debug!(%tag, "strategy produced no turns, falling back to generic");
    (GenericStrategy.extract(text), FormatTag::Generic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Role;

    struct WordCount;

    impl TokenEstimator for WordCount {
        fn estimate(&self, text: &str, _model: Option<&str>) -> usize {
            text.split_whitespace().count()
        }
    }

    fn parser() -> TranscriptParser {
        TranscriptParser::new(Arc::new(WordCount))
    }

    #[test]
    fn test_parse_said_format() {
        let parsed = parser().parse("You said: Hi\nChatGPT said: Hello");
        assert_eq!(parsed.format_tag, FormatTag::SaidFormat);
        assert_eq!(parsed.turns, vec![Turn::user("Hi"), Turn::assistant("Hello")]);
        assert_eq!(parsed.turn_count, 2);
        assert_eq!(parsed.estimated_tokens, 6);
    }

    #[test]
    fn test_parse_empty_input() {
        let parsed = parser().parse("");
        assert_eq!(parsed.turns, vec![Turn::user("")]);
        assert_eq!(parsed.format_tag, FormatTag::Generic);
        assert_eq!(parsed.estimated_tokens, 0);
    }

    #[test]
    fn test_structured_without_records_falls_back_to_generic() {
        let parsed = parser().parse(r#"{"title": "my notes"}"#);
        assert_eq!(parsed.format_tag, FormatTag::Generic);
        assert_eq!(parsed.turns.len(), 1);
        assert_eq!(parsed.turns[0].role, Role::User);
    }

    #[test]
    fn test_crlf_input_keeps_raw_text() {
        let raw = "User: hi\r\nAssistant: hello\r\n";
        let parsed = parser().parse(raw);
        assert_eq!(parsed.format_tag, FormatTag::Conversation);
        assert_eq!(parsed.turns, vec![Turn::user("hi"), Turn::assistant("hello")]);
        assert_eq!(parsed.raw_text, raw);
    }

    #[test]
    fn test_parse_always_yields_a_turn() {
        for input in ["", " ", "\n\n\n", "[]", "{}", "# User\n", "You said:", "???"] {
            assert!(!parser().parse(input).turns.is_empty(), "{input:?}");
        }
    }
}
