//! Heuristic parser for unlabeled or loosely labeled text.
//!
//! Works line by line over a small state machine:
//!
//! - An explicit `Label:` prefix always starts a new turn with that role.
//! - A line whose phrasing implies a role starts a new turn only when that
//!   role differs from the current one.
//! - Two or more consecutive blank lines end the current turn and flip the
//!   role for whatever follows.
//! - Lines inside a fenced code block are content and never trigger role
//!   detection or splitting.
//!
//! A final repair pass restores user/assistant alternation: a turn with the
//! same role as its predecessor is merged into it when its role was explicit,
//! and has its role flipped when the role was only inferred.

use super::heuristics::{explicit_role_prefix, inferred_role};
use super::strategies::ParserStrategy;
use super::types::{FormatTag, Role, Turn};

const FENCE: &str = "```";

/// Fallback strategy for text no labeled format recognizes.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericStrategy;

impl ParserStrategy for GenericStrategy {
    fn tag(&self) -> FormatTag {
        FormatTag::Generic
    }

    fn extract(&self, text: &str) -> Vec<Turn> {
        let mut state = LineState::default();
        for line in text.lines() {
            state.feed(line);
        }
        let drafts = state.finish();

        if drafts.is_empty() {
            let content = if text.trim().is_empty() { text } else { text.trim() };
            return vec![Turn::user(content)];
        }

        repair_alternation(drafts)
    }
}

/// A turn before the alternation repair.
#[derive(Debug)]
struct Draft {
    role: Role,
    content: String,
    /// The role came from a label rather than from phrasing.
    explicit: bool,
}

#[derive(Debug, Default)]
struct LineState {
    drafts: Vec<Draft>,
    role: Option<Role>,
    explicit: bool,
    buffer: Vec<String>,
    blank_run: usize,
    in_fence: bool,
}

impl LineState {
    fn feed(&mut self, raw: &str) {
        if self.in_fence {
            self.feed_fenced(raw);
            return;
        }

        let line = raw.trim();
        if line.is_empty() {
            self.blank_run += 1;
            if self.has_content() {
                if self.blank_run == 2 {
                    self.flush();
                    self.role = self.role.map(Role::flipped);
                    self.explicit = false;
                } else {
                    self.buffer.push(String::new());
                }
            }
            return;
        }
        self.blank_run = 0;

        let mut line = line;
        if let Some((role, rest)) = explicit_role_prefix(line) {
            self.start_turn(role, true);
            if rest.is_empty() {
                return;
            }
            line = rest;
        } else if let Some(role) = inferred_role(line)
            && self.role != Some(role)
        {
            self.start_turn(role, false);
        }

        if self.role.is_none() {
            self.role = Some(Role::User);
        }
        if line.starts_with(FENCE) {
            self.in_fence = true;
        }
        self.buffer.push(line.to_string());
    }

    /// Inside a fence lines keep their indentation and blank lines are kept.
    fn feed_fenced(&mut self, raw: &str) {
        let line = raw.trim_end();
        if line.trim_start().starts_with(FENCE) {
            self.in_fence = false;
            self.buffer.push(line.trim_start().to_string());
        } else {
            self.buffer.push(line.to_string());
        }
        self.blank_run = 0;
    }

    fn start_turn(&mut self, role: Role, explicit: bool) {
        self.flush();
        self.role = Some(role);
        self.explicit = explicit;
    }

    fn has_content(&self) -> bool {
        self.buffer.iter().any(|line| !line.trim().is_empty())
    }

    fn flush(&mut self) {
        if self.has_content()
            && let Some(role) = self.role
        {
            self.drafts.push(Draft {
                role,
                content: self.buffer.join("\n").trim().to_string(),
                explicit: self.explicit,
            });
        }
        self.buffer.clear();
    }

    fn finish(mut self) -> Vec<Draft> {
        self.flush();
        self.drafts
    }
}

fn repair_alternation(drafts: Vec<Draft>) -> Vec<Turn> {
    let mut turns: Vec<Turn> = Vec::with_capacity(drafts.len());
    for draft in drafts {
        match turns.last_mut() {
            Some(prev) if prev.role == draft.role && draft.explicit => {
                prev.content.push_str("\n\n");
                prev.content.push_str(&draft.content);
            }
            Some(prev) if prev.role == draft.role => {
                turns.push(Turn::new(draft.role.flipped(), draft.content));
            }
            _ => turns.push(Turn::new(draft.role, draft.content)),
        }
    }
    turns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<Turn> {
        GenericStrategy.extract(text)
    }

    #[test]
    fn test_explicit_labels() {
        let turns = parse("User: how do I sort a vec?\nAssistant: call sort().");
        assert_eq!(
            turns,
            vec![
                Turn::user("how do I sort a vec?"),
                Turn::assistant("call sort().")
            ]
        );
    }

    #[test]
    fn test_label_on_its_own_line() {
        let turns = parse("User:\nfirst line\nsecond line\nAssistant:\nreply");
        assert_eq!(
            turns,
            vec![Turn::user("first line\nsecond line"), Turn::assistant("reply")]
        );
    }

    #[test]
    fn test_inferred_roles_alternate() {
        let turns = parse("How do I read a file?\nHere's how you can do it:\nuse std::fs.");
        assert_eq!(
            turns,
            vec![
                Turn::user("How do I read a file?"),
                Turn::assistant("Here's how you can do it:\nuse std::fs.")
            ]
        );
    }

    #[test]
    fn test_same_inferred_role_does_not_split() {
        let turns = parse("What is Rust?\nWhy is it fast?");
        assert_eq!(turns, vec![Turn::user("What is Rust?\nWhy is it fast?")]);
    }

    #[test]
    fn test_double_blank_line_flips_role() {
        let turns = parse("first thought\n\n\nsecond block");
        assert_eq!(
            turns,
            vec![Turn::user("first thought"), Turn::assistant("second block")]
        );
    }

    #[test]
    fn test_single_blank_line_keeps_paragraphs() {
        let turns = parse("para one\n\npara two");
        assert_eq!(turns, vec![Turn::user("para one\n\npara two")]);
    }

    #[test]
    fn test_explicit_same_role_is_merged() {
        let turns = parse("User: part one\nUser: part two\nAssistant: ok");
        assert_eq!(
            turns,
            vec![
                Turn::user("part one\n\npart two"),
                Turn::assistant("ok")
            ]
        );
    }

    #[test]
    fn test_inferred_same_role_is_flipped() {
        // The blank run flips to assistant, then a question pulls it back to
        // user, leaving two user drafts in a row.
        let turns = parse("User: question\n\n\nWhat else?");
        assert_eq!(
            turns,
            vec![Turn::user("question"), Turn::assistant("What else?")]
        );
    }

    #[test]
    fn test_fenced_code_is_opaque() {
        let text = "User: fix this\n```python\ndef f():\n\n\n    return 1  # What?\n```\nAssistant: done";
        let turns = parse(text);
        assert_eq!(turns.len(), 2);
        assert_eq!(
            turns[0].content,
            "fix this\n```python\ndef f():\n\n\n    return 1  # What?\n```"
        );
        assert_eq!(turns[1], Turn::assistant("done"));
    }

    #[test]
    fn test_unlabeled_text_is_single_user_turn() {
        let turns = parse("some notes\nmore notes");
        assert_eq!(turns, vec![Turn::user("some notes\nmore notes")]);
    }

    #[test]
    fn test_empty_input_is_verbatim_user_turn() {
        assert_eq!(parse(""), vec![Turn::user("")]);
        assert_eq!(parse("  \n\n "), vec![Turn::user("  \n\n ")]);
    }

    #[test]
    fn test_label_only_input() {
        assert_eq!(parse("User:"), vec![Turn::user("User:")]);
    }

    #[test]
    fn test_alternation_after_repair() {
        let text = "User: a\nUser: b\nI'm sorry, no.\nI apologize again.\nPlease?\n\n\nmore";
        let turns = parse(text);
        for pair in turns.windows(2) {
            assert_ne!(pair[0].role, pair[1].role);
        }
    }
}
