//! Types for parsed transcripts.

use serde::{Deserialize, Serialize};

/// Speaker of a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Unknown,
}

impl Role {
    /// Normalize a free-form speaker name into a role.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "user" | "human" | "you" | "me" | "customer" | "person" => Role::User,
            "assistant" | "ai" | "bot" | "model" | "gpt" | "chatgpt" | "claude" | "gemini"
            | "grok" | "bard" => Role::Assistant,
            "system" => Role::System,
            _ => Role::Unknown,
        }
    }

    /// The opposite side of a user/assistant exchange.
    ///
    /// Anything that is not `User` flips to `User`.
    pub fn flipped(self) -> Self {
        match self {
            Role::User => Role::Assistant,
            _ => Role::User,
        }
    }

    /// Capitalized label used when rendering turns as `Label: content`.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
            Role::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
            Role::Unknown => write!(f, "unknown"),
        }
    }
}

/// One role-tagged message extracted from a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Render as `Label: content`.
    pub fn render(&self) -> String {
        format!("{}: {}", self.role.label(), self.content)
    }
}

/// Render turns as `Label: content` paragraphs separated by blank lines.
pub fn render_turns(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(Turn::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The transcript convention a parser strategy handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatTag {
    /// JSON list/object of role + content records.
    Structured,
    /// `You said:` / `ChatGPT said:` exports.
    SaidFormat,
    /// Markdown headers per turn (`# User`, `## Assistant`).
    Headered,
    /// `User:` / `AI:` line prefixes.
    Conversation,
    /// Unlabeled free-form text.
    Generic,
}

impl std::fmt::Display for FormatTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatTag::Structured => write!(f, "structured"),
            FormatTag::SaidFormat => write!(f, "said_format"),
            FormatTag::Headered => write!(f, "headered"),
            FormatTag::Conversation => write!(f, "conversation"),
            FormatTag::Generic => write!(f, "generic"),
        }
    }
}

/// Result of one `parse` call. Never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedTranscript {
    pub turns: Vec<Turn>,
    pub format_tag: FormatTag,
    pub raw_text: String,
    pub turn_count: usize,
    pub estimated_tokens: usize,
}

impl ParsedTranscript {
    pub fn new(turns: Vec<Turn>, format_tag: FormatTag, raw_text: &str, estimated_tokens: usize) -> Self {
        Self {
            turn_count: turns.len(),
            turns,
            format_tag,
            raw_text: raw_text.to_string(),
            estimated_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_name() {
        assert_eq!(Role::from_name("You"), Role::User);
        assert_eq!(Role::from_name("ChatGPT"), Role::Assistant);
        assert_eq!(Role::from_name(" SYSTEM "), Role::System);
        assert_eq!(Role::from_name("narrator"), Role::Unknown);
    }

    #[test]
    fn test_role_flipped() {
        assert_eq!(Role::User.flipped(), Role::Assistant);
        assert_eq!(Role::Assistant.flipped(), Role::User);
        assert_eq!(Role::System.flipped(), Role::User);
    }

    #[test]
    fn test_render_turns() {
        let turns = vec![Turn::user("Hi"), Turn::assistant("Hello")];
        assert_eq!(render_turns(&turns), "User: Hi\n\nAssistant: Hello");
    }

    #[test]
    fn test_format_tag_serde_matches_display() {
        for tag in [
            FormatTag::Structured,
            FormatTag::SaidFormat,
            FormatTag::Headered,
            FormatTag::Conversation,
            FormatTag::Generic,
        ] {
            let json = serde_json::to_string(&tag).unwrap();
            assert_eq!(json, format!("\"{}\"", tag));
        }
    }

    #[test]
    fn test_parsed_transcript_counts_turns() {
        let parsed = ParsedTranscript::new(
            vec![Turn::user("a"), Turn::assistant("b")],
            FormatTag::Generic,
            "a\nb",
            3,
        );
        assert_eq!(parsed.turn_count, 2);
        assert_eq!(parsed.raw_text, "a\nb");
    }
}
