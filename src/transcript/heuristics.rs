//! Phrase tables and compiled patterns for role and format detection.
//!
//! The tables are plain data so each strategy can be tested against them in
//! isolation; the regexes are compiled once on first use.

use super::types::Role;
use regex::{Regex, RegexSet};
use std::sync::LazyLock;

/// Speakers recognized in `<Speaker> said:` exports.
pub const SAID_SPEAKERS: &[&str] = &[
    "You",
    "ChatGPT",
    "Claude",
    "Gemini",
    "Grok",
    "Bard",
    "AI",
    "Assistant",
];

/// Markdown header titles that mark a turn boundary.
pub const HEADER_ROLES: &[&str] = &[
    "user",
    "human",
    "you",
    "assistant",
    "chatgpt",
    "gpt",
    "claude",
    "gemini",
    "ai",
    "model",
    "system",
];

/// `Role:` line prefixes of the conversation format.
pub const CONVERSATION_LABELS: &[&str] = &[
    "User",
    "Human",
    "Person",
    "Customer",
    "AI",
    "Bot",
    "Assistant",
    "System",
];

/// Labels accepted as an explicit `Label:` prefix by the generic parser.
pub const EXPLICIT_COLON_LABELS: &[&str] = &[
    "user",
    "human",
    "me",
    "ai",
    "assistant",
    "bot",
    "chatgpt",
    "claude",
    "gemini",
    "system",
];

/// Labels also accepted as a bare `Label ` prefix (no colon).
///
/// Short words like "I", "me" and "AI" start ordinary sentences too often.
pub const EXPLICIT_BARE_LABELS: &[&str] = &["user", "human", "assistant", "chatgpt", "claude", "gemini"];

/// Openers typical of assistant replies.
pub const ASSISTANT_OPENERS: &[&str] = &[
    r"^I'm (sorry|afraid|happy to)",
    r"^I apologi[sz]e",
    r"^As (an|a) (AI|assistant|language model)",
    r"^Let me (explain|show|help|walk you)",
    r"^Here('s| is) (how|what|why|an example|a|the)\b",
    r"^Certainly!",
    r"^Of course!",
    r"^Sure thing!",
    r"^Great question",
    r"^The best way to",
    r"^Let's go step by step",
    r"^Based on (my knowledge|your request|the data)",
    r"^To summarize",
    r"^Thank you for your question",
];

/// Phrasings typical of user messages: questions, requests, direct address.
pub const USER_PHRASINGS: &[&str] = &[
    r"\?$",
    r"^(Can|Could|How|What|Why|When|Where|Is|Are|Do|Does|Will|Would|Should) ",
    r"^Please ",
    r"^Tell me ",
    r"^I (need|want|would like|am trying to)\b",
    r"^(Write|Create|Generate|Explain|Summarize|Analyze)\b",
    r"^(Claude|ChatGPT|Gemini|Assistant|AI),",
];

fn alternation(words: &[&str]) -> String {
    words.join("|")
}

pub static SAID_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({})\s+said:", alternation(SAID_SPEAKERS)))
        .expect("said marker pattern is valid")
});

pub static HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?mi)^[ \t]*#{{1,6}}[ \t]+({})[ \t]*:?[ \t]*$",
        alternation(HEADER_ROLES)
    ))
    .expect("header pattern is valid")
});

pub static CONVERSATION_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?m)^[ \t]*({}):(?:[ \t]|$)",
        alternation(CONVERSATION_LABELS)
    ))
    .expect("conversation label pattern is valid")
});

static EXPLICIT_COLON_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^({})\s*:\s*(.*)$",
        alternation(EXPLICIT_COLON_LABELS)
    ))
    .expect("explicit label pattern is valid")
});

static EXPLICIT_BARE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^({})\s+(.*)$",
        alternation(EXPLICIT_BARE_LABELS)
    ))
    .expect("bare label pattern is valid")
});

static ASSISTANT_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(ASSISTANT_OPENERS.iter().map(|p| format!("(?i){p}")))
        .expect("assistant opener patterns are valid")
});

static USER_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(USER_PHRASINGS.iter().map(|p| format!("(?i){p}")))
        .expect("user phrasing patterns are valid")
});

/// Match an explicit role label at the start of a trimmed line.
///
/// Returns the role and the remainder of the line with the label stripped.
pub fn explicit_role_prefix(line: &str) -> Option<(Role, &str)> {
    let caps = EXPLICIT_COLON_REGEX
        .captures(line)
        .or_else(|| EXPLICIT_BARE_REGEX.captures(line))?;
    let label = caps.get(1)?.as_str();
    let rest = caps.get(2).map_or("", |m| m.as_str()).trim();
    Some((Role::from_name(label), rest))
}

/// Infer a role from the phrasing of a trimmed line.
///
/// Assistant openers are checked before user phrasings.
pub fn inferred_role(line: &str) -> Option<Role> {
    if ASSISTANT_SET.is_match(line) {
        Some(Role::Assistant)
    } else if USER_SET.is_match(line) {
        Some(Role::User)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_colon_prefix() {
        assert_eq!(
            explicit_role_prefix("User: how do I sort?"),
            Some((Role::User, "how do I sort?"))
        );
        assert_eq!(
            explicit_role_prefix("chatgpt:   Sure."),
            Some((Role::Assistant, "Sure."))
        );
        assert_eq!(
            explicit_role_prefix("System: be terse"),
            Some((Role::System, "be terse"))
        );
    }

    #[test]
    fn test_explicit_bare_prefix() {
        assert_eq!(
            explicit_role_prefix("Assistant here is the fix"),
            Some((Role::Assistant, "here is the fix"))
        );
        // Bare "AI" is not a label; it starts ordinary sentences.
        assert_eq!(explicit_role_prefix("AI is changing everything"), None);
    }

    #[test]
    fn test_explicit_prefix_with_empty_rest() {
        assert_eq!(explicit_role_prefix("User:"), Some((Role::User, "")));
    }

    #[test]
    fn test_no_explicit_prefix() {
        assert_eq!(explicit_role_prefix("Username validation fails"), None);
        assert_eq!(explicit_role_prefix("Claude, can you help?"), None);
    }

    #[test]
    fn test_assistant_openers() {
        assert_eq!(inferred_role("I'm sorry, that isn't possible."), Some(Role::Assistant));
        assert_eq!(inferred_role("As an AI language model I cannot"), Some(Role::Assistant));
        assert_eq!(inferred_role("Here's how you can do it:"), Some(Role::Assistant));
        assert_eq!(inferred_role("certainly! here you go"), Some(Role::Assistant));
    }

    #[test]
    fn test_user_phrasings() {
        assert_eq!(inferred_role("What is a monad"), Some(Role::User));
        assert_eq!(inferred_role("it fails with this error?"), Some(Role::User));
        assert_eq!(inferred_role("Please rewrite it in Rust"), Some(Role::User));
        assert_eq!(inferred_role("Claude, review this"), Some(Role::User));
        assert_eq!(inferred_role("Write a parser for CSV"), Some(Role::User));
    }

    #[test]
    fn test_assistant_checked_before_user() {
        // Ends with '?' but opens like an assistant reply.
        assert_eq!(
            inferred_role("Let me explain, does that make sense?"),
            Some(Role::Assistant)
        );
    }

    #[test]
    fn test_no_signal() {
        assert_eq!(inferred_role("The function returns early."), None);
        assert_eq!(inferred_role("fn main() {}"), None);
    }

    #[test]
    fn test_said_marker_is_word_bounded() {
        assert!(SAID_MARKER_REGEX.is_match("ChatGPT said: hi"));
        assert!(SAID_MARKER_REGEX.is_match("you said: hi"));
        assert!(!SAID_MARKER_REGEX.is_match("OpenAI said: hi"));
    }

    #[test]
    fn test_header_regex_requires_role_title() {
        assert!(HEADER_REGEX.is_match("## User\nhello"));
        assert!(HEADER_REGEX.is_match("# assistant:\nhi"));
        assert!(!HEADER_REGEX.is_match("# Installation\nrun it"));
    }

    #[test]
    fn test_conversation_label_regex() {
        assert!(CONVERSATION_LABEL_REGEX.is_match("intro\nUser: hi"));
        assert!(CONVERSATION_LABEL_REGEX.is_match("Bot:"));
        assert!(!CONVERSATION_LABEL_REGEX.is_match("the User: field"));
    }
}
