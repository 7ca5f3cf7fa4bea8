//! Code fidelity: pull code out before summarizing, put back what got lost.
//!
//! Summaries paraphrase. Code must survive byte-for-byte, so every fenced
//! block and code-like inline span in the historical turns is recorded up
//! front, and any that the final summary no longer contains is appended
//! under an `Important Code Blocks` section.

use crate::transcript::Turn;
use crate::util::normalize_whitespace;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Heading and lead-in for re-injected fragments.
pub const MISSING_CODE_HEADER: &str = "\n\n## Important Code Blocks\n\n\
    The following code snippets from the conversation must be preserved:\n\n";

static FENCED_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([\w+#.-]*)[ \t]*\r?\n(.*?)```").expect("fenced block pattern is valid")
});

static INLINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]{3,}?)`").expect("inline code pattern is valid"));

static CODE_LIKE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[=(){}\[\]<>]|\w+\(").expect("code-like pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    Fenced,
    Inline,
}

/// A piece of code found in a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFragment {
    pub language: Option<String>,
    pub code: String,
    pub kind: FragmentKind,
}

impl CodeFragment {
    pub fn fenced(language: Option<&str>, code: impl Into<String>) -> Self {
        Self {
            language: language.map(str::to_string),
            code: code.into(),
            kind: FragmentKind::Fenced,
        }
    }

    pub fn inline(code: impl Into<String>) -> Self {
        Self {
            language: None,
            code: code.into(),
            kind: FragmentKind::Inline,
        }
    }

    /// Render as a markdown fence, tagged with the language when known.
    pub fn to_fence(&self) -> String {
        format!(
            "```{}\n{}\n```",
            self.language.as_deref().unwrap_or(""),
            self.code
        )
    }
}

/// Whether `text` contains `fragment`, ignoring whitespace differences.
pub fn contains_fragment(text: &str, fragment: &CodeFragment) -> bool {
    normalize_whitespace(text).contains(&normalize_whitespace(&fragment.code))
}

/// Extracts code fragments and re-injects the ones a summary dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeFidelityGuard {
    min_len: usize,
}

impl CodeFidelityGuard {
    /// Fragments shorter than `min_len` characters are never re-injected.
    pub fn new(min_len: usize) -> Self {
        Self { min_len }
    }

    /// Every distinct non-blank fragment in `turns`, in transcript order.
    pub fn extract(&self, turns: &[Turn]) -> Vec<CodeFragment> {
        let mut seen = HashSet::new();
        turns
            .iter()
            .flat_map(|turn| extract_fragments(&turn.content))
            .filter(|fragment| seen.insert(fragment.code.clone()))
            .collect()
    }

    /// Append any sufficiently long fragment missing from `summary`.
    ///
    /// Returns the (possibly extended) summary and the number of fragments
    /// re-injected.
    pub fn ensure(&self, summary: &str, fragments: &[CodeFragment]) -> (String, usize) {
        let normalized = normalize_whitespace(summary);
        let missing: Vec<&CodeFragment> = fragments
            .iter()
            .filter(|f| f.code.chars().count() >= self.min_len)
            .filter(|f| !survived(f, summary, &normalized))
            .collect();

        if missing.is_empty() {
            return (summary.to_string(), 0);
        }

        let mut out = String::with_capacity(summary.len() + MISSING_CODE_HEADER.len());
        out.push_str(summary);
        out.push_str(MISSING_CODE_HEADER);
        let fences: Vec<String> = missing.iter().map(|f| f.to_fence()).collect();
        out.push_str(&fences.join("\n\n"));
        (out, missing.len())
    }
}

impl Default for CodeFidelityGuard {
    fn default() -> Self {
        Self::new(super::DEFAULT_MIN_CODE_LEN)
    }
}

fn extract_fragments(content: &str) -> Vec<CodeFragment> {
    let mut fragments: Vec<CodeFragment> = FENCED_REGEX
        .captures_iter(content)
        .filter_map(|cap| {
            let code = cap.get(2)?.as_str().trim_start_matches(['\r', '\n']).trim_end();
            if code.trim().is_empty() {
                return None;
            }
            let language = cap.get(1).map(|m| m.as_str()).filter(|l| !l.is_empty());
            Some(CodeFragment::fenced(language, code))
        })
        .collect();

    if content.contains('`') {
        let prose = FENCED_REGEX.replace_all(content, "");
        fragments.extend(
            INLINE_REGEX
                .captures_iter(&prose)
                .filter_map(|cap| cap.get(1))
                .map(|m| m.as_str().trim())
                .filter(|code| !code.is_empty() && CODE_LIKE_REGEX.is_match(code))
                .map(CodeFragment::inline),
        );
    }

    fragments
}

/// A fragment survived if its normalized text is in the summary, or, for
/// fragments longer than two lines, if its first or last line is.
fn survived(fragment: &CodeFragment, summary: &str, normalized_summary: &str) -> bool {
    if normalized_summary.contains(&normalize_whitespace(&fragment.code)) {
        return true;
    }

    let lines: Vec<&str> = fragment.code.lines().collect();
    if lines.len() <= 2 {
        return false;
    }
    let first = lines[0].trim();
    let last = lines[lines.len() - 1].trim();
    first.is_empty() || last.is_empty() || summary.contains(first) || summary.contains(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_BLOCK: &str = "def load(path):\n    with open(path) as f:\n        return f.read()";

    fn fenced_turn(lang: &str, code: &str) -> Turn {
        Turn::assistant(format!("Try this:\n```{lang}\n{code}\n```\nDone."))
    }

    #[test]
    fn test_extract_fenced_with_language() {
        let fragments = CodeFidelityGuard::default().extract(&[fenced_turn("python", LONG_BLOCK)]);
        assert_eq!(fragments, vec![CodeFragment::fenced(Some("python"), LONG_BLOCK)]);
    }

    #[test]
    fn test_extract_fenced_without_language_keeps_indentation() {
        let code = "    indented()\n    more()";
        let fragments = CodeFidelityGuard::default().extract(&[fenced_turn("", code)]);
        assert_eq!(fragments, vec![CodeFragment::fenced(None, code)]);
    }

    #[test]
    fn test_extract_inline_code_like_only() {
        let turn = Turn::user("Call `parse(input)` not `the docs`; also `x = 1` and `ab`.");
        let fragments = CodeFidelityGuard::default().extract(&[turn]);
        assert_eq!(
            fragments,
            vec![CodeFragment::inline("parse(input)"), CodeFragment::inline("x = 1")]
        );
    }

    #[test]
    fn test_inline_scan_ignores_fence_bodies() {
        let turn = fenced_turn("rust", "let s = `not inline(x)`;");
        let fragments = CodeFidelityGuard::default().extract(&[turn]);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].kind, FragmentKind::Fenced);
    }

    #[test]
    fn test_blank_and_duplicate_fragments_skipped() {
        let turns = vec![
            Turn::user("```\n   \n```"),
            fenced_turn("python", LONG_BLOCK),
            fenced_turn("python", LONG_BLOCK),
        ];
        assert_eq!(CodeFidelityGuard::default().extract(&turns).len(), 1);
    }

    #[test]
    fn test_ensure_keeps_summary_with_code() {
        let fragments = vec![CodeFragment::fenced(Some("python"), LONG_BLOCK)];
        let summary = format!("They wrote:\n{}", LONG_BLOCK.replace("\n    ", "\n  "));
        let (out, reinjected) = CodeFidelityGuard::default().ensure(&summary, &fragments);
        assert_eq!(out, summary);
        assert_eq!(reinjected, 0);
    }

    #[test]
    fn test_ensure_first_line_present_counts_as_kept() {
        let fragments = vec![CodeFragment::fenced(Some("python"), LONG_BLOCK)];
        let (_, reinjected) =
            CodeFidelityGuard::default().ensure("Defined def load(path): to read files", &fragments);
        assert_eq!(reinjected, 0);
    }

    #[test]
    fn test_ensure_reinjects_lost_block() {
        let fragments = vec![CodeFragment::fenced(Some("python"), LONG_BLOCK)];
        let (out, reinjected) = CodeFidelityGuard::default().ensure("They discussed files.", &fragments);
        assert_eq!(reinjected, 1);
        assert_eq!(
            out,
            format!(
                "They discussed files.\n\n## Important Code Blocks\n\n\
                 The following code snippets from the conversation must be preserved:\n\n\
                 ```python\n{LONG_BLOCK}\n```"
            )
        );
    }

    #[test]
    fn test_ensure_short_fragment_lost_when_absent() {
        let fragments = vec![CodeFragment::inline("client.connect(timeout=30)")];
        let (out, reinjected) = CodeFidelityGuard::default().ensure("Connected.", &fragments);
        assert_eq!(reinjected, 1);
        assert!(out.ends_with("```\nclient.connect(timeout=30)\n```"));
    }

    #[test]
    fn test_ensure_skips_fragments_below_threshold() {
        let fragments = vec![CodeFragment::inline("x = 1")];
        let (out, reinjected) = CodeFidelityGuard::default().ensure("nothing", &fragments);
        assert_eq!((out.as_str(), reinjected), ("nothing", 0));
    }

    #[test]
    fn test_contains_fragment_ignores_whitespace() {
        let fragment = CodeFragment::inline("a  =\n b");
        assert!(contains_fragment("x a = b y", &fragment));
        assert!(!contains_fragment("a = c", &fragment));
    }
}
