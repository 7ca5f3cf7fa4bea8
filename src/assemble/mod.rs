//! Continuation-prompt assembly.
//!
//! Renders a compressed history, the verbatim recent turns, and any code the
//! history does not already carry into one prompt for the target model.
//! Turn-taking labels differ per model family and live in a data table;
//! unrecognized models get a neutral rendering with no sentinels.

use crate::compress::{CodeFragment, contains_fragment};
use crate::transcript::{Role, Turn};

pub const HISTORY_HEADER: &str = "# Previous Conversation Summary";
pub const RECENT_HEADER: &str = "# Recent Messages (Verbatim)";
pub const CODE_HEADER: &str = "# Code and Technical Content";

pub const CONTINUATION_INSTRUCTION: &str = "Based on the conversation history summarized above \
and the recent messages, please continue the discussion naturally. The most recent messages are \
provided verbatim to give you the exact current context.";

/// Per-family labels marking turn boundaries in the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentinels {
    /// Prefix of the whole prompt.
    pub open: &'static str,
    /// Suffix of the whole prompt, handing the turn to the model.
    pub close: &'static str,
    pub user_label: &'static str,
    pub assistant_label: &'static str,
}

impl Sentinels {
    pub const NEUTRAL: Self = Self {
        open: "",
        close: "",
        user_label: "User",
        assistant_label: "Assistant",
    };

    /// Look up the sentinels for a target model id by prefix.
    pub fn for_model(model: &str) -> Self {
        SENTINEL_TABLE
            .iter()
            .find(|(prefixes, _)| prefixes.iter().any(|p| model.starts_with(p)))
            .map_or(Self::NEUTRAL, |(_, sentinels)| *sentinels)
    }

    fn label(&self, role: Role) -> &'static str {
        match role {
            Role::User => self.user_label,
            Role::Assistant => self.assistant_label,
            other => other.label(),
        }
    }
}

const SENTINEL_TABLE: &[(&[&str], Sentinels)] = &[
    (
        &["gpt-", "o1", "o3"],
        Sentinels {
            open: "System: ",
            close: "User: ",
            user_label: "User",
            assistant_label: "Assistant",
        },
    ),
    (
        &["claude-"],
        Sentinels {
            open: "Human: ",
            close: "Human: ",
            user_label: "Human",
            assistant_label: "Assistant",
        },
    ),
    (
        &["gemini-"],
        Sentinels {
            open: "User: ",
            close: "User: ",
            user_label: "User",
            assistant_label: "Model",
        },
    ),
];

/// Collects headed sections and joins them with blank lines.
#[derive(Debug, Default)]
pub struct SectionBuilder {
    sections: Vec<String>,
}

impl SectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `header` followed by `body`, or nothing when `body` is blank.
    pub fn section(mut self, header: &str, body: &str) -> Self {
        if !body.trim().is_empty() {
            self.sections.push(format!("{header}\n\n{}", body.trim_end()));
        }
        self
    }

    /// Add a paragraph with no header.
    pub fn paragraph(mut self, text: &str) -> Self {
        self.sections.push(text.to_string());
        self
    }

    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }
}

/// Builds the final continuation prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptAssembler;

impl PromptAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Render the prompt. Identical inputs always give identical output.
    pub fn assemble(
        &self,
        history: &str,
        recent: &[Turn],
        fragments: &[CodeFragment],
        target_model: &str,
    ) -> String {
        let sentinels = Sentinels::for_model(target_model);

        let recent_body = recent
            .iter()
            .map(|turn| format!("{}: {}", sentinels.label(turn.role), turn.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        let code_body = fragments
            .iter()
            .filter(|f| !f.code.trim().is_empty())
            .filter(|f| {
                !contains_fragment(history, f)
                    && !recent.iter().any(|turn| contains_fragment(&turn.content, f))
            })
            .map(CodeFragment::to_fence)
            .collect::<Vec<_>>()
            .join("\n\n");

        let body = SectionBuilder::new()
            .section(HISTORY_HEADER, history)
            .section(RECENT_HEADER, &recent_body)
            .section(CODE_HEADER, &code_body)
            .paragraph(CONTINUATION_INSTRUCTION)
            .build();

        format!("{}{body}\n\n{}", sentinels.open, sentinels.close)
    }
}
