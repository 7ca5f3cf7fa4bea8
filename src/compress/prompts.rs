//! Prompt templates for the map, reduce and one-shot summary calls.

use super::chunker::Chunk;
use crate::transcript::{Turn, render_turns};

/// Separator placed between summaries handed to a reduce call.
pub const SUMMARY_SEPARATOR: &str = "\n\n---\n\n";

const MAP_REQUIREMENTS: &str = "\
You MUST preserve:
1. All questions and their answers
2. All technical details and implementation information
3. All code snippets and code references
4. Important decisions and requirements mentioned
5. References to earlier or later parts of the conversation
6. The flow and continuity of technical discussions";

const SUMMARY_INSTRUCTIONS: &str = "\
You are creating a comprehensive summary of a conversation that will be used to continue the discussion effectively.
Your task is to create a condensed yet complete summary that:

1. Preserves the core context and flow of the conversation while reducing length
   - Maintain the primary topics, questions, and key insights
   - Capture the evolution of ideas throughout the discussion

2. Prioritizes important information based on the conversation type:
   - If technical: preserve all technical details, code snippets, implementation plans
   - If conceptual: preserve key concepts, definitions, and relationships
   - If decision-making: preserve options considered, criteria, and conclusions reached

3. Always retain with high fidelity:
   - Specific facts, figures, and named references
   - Questions asked and their answers
   - Any code, formulas, or structured information
   - Explicit decisions or agreements made
   - Core requirements or constraints mentioned

4. Maintain chronological development while eliminating redundancy
   - Show how ideas progressed without repeating similar content
   - Connect related points across different parts of the conversation

The summary should contain enough detail that someone could continue the conversation with full context, without needing to reference the original discussion.";

/// Prompt summarizing one chunk, given its context preamble.
pub fn map_prompt(chunk: &Chunk, preamble: &str) -> String {
    let mut prompt = format!(
        "Summarize this conversation segment concisely while preserving all important information.\n\n\
         CONTEXT: {preamble}\n\n\
         {MAP_REQUIREMENTS}\n\n"
    );
    if chunk.is_first {
        prompt.push_str(
            "As this is the beginning of the conversation, include all context-setting information.\n",
        );
    }
    if chunk.is_last {
        prompt.push_str(
            "As this is the end of the historical conversation, ensure you provide a proper lead-in to subsequent messages.\n",
        );
    }
    prompt.push_str(
        "\nFocus on factual technical information rather than conversational elements.\n\n\
         Conversation segment:\n",
    );
    prompt.push_str(&render_turns(&chunk.turns));
    prompt.push_str("\n\nConcise summary preserving all key information:");
    prompt
}

/// Prompt merging several summaries into one.
///
/// A final reduce must stand alone as the whole history; an intermediate
/// one only needs to survive another round of reduction.
pub fn reduce_prompt(summaries: &[String], is_final: bool) -> String {
    let (opening, shape, purpose) = if is_final {
        (
            "Create the final comprehensive summary",
            "complete, cohesive summary",
            "Provides a complete picture of the entire conversation",
        )
    } else {
        (
            "Create an intermediate summary",
            "partial summary",
            "Prepares for further summarization",
        )
    };

    let mut prompt = format!(
        "{opening} from these conversation segment summaries.\n\n\
         Your task is to create a {shape} that:\n\
         1. Preserves ALL technical details from every section\n\
         2. Keeps ALL code snippets intact exactly as written\n\
         3. Maintains the chronological flow and narrative continuity\n\
         4. Creates smooth transitions between topics\n\
         5. Eliminates redundancy while preserving unique information\n\
         6. {purpose}\n\n"
    );
    if is_final {
        prompt.push_str(
            "The summary should be detailed enough to continue the conversation without the original content.\n\n",
        );
    }
    prompt.push_str("Segment summaries to combine:\n");
    prompt.push_str(&summaries.join(SUMMARY_SEPARATOR));
    prompt.push_str("\n\nCombined summary preserving all essential information:");
    prompt
}

/// Prompt summarizing a short history in one call, without chunking.
pub fn summary_prompt(turns: &[Turn]) -> String {
    format!(
        "{SUMMARY_INSTRUCTIONS}\n\nHere is the conversation to summarize:\n{}\n\n\
         Create a comprehensive and balanced summary that preserves all essential context needed to continue this conversation:\n",
        render_turns(turns)
    )
}
