//! Transcript ingestion: format detection and role-tagged turn extraction.
//!
//! ## Formats
//!
//! - **structured**: JSON message lists (`[{"role": ..., "content": ...}]`)
//! - **said_format**: `You said:` / `ChatGPT said:` exports
//! - **headered**: one markdown header per turn (`# User`, `## Assistant`)
//! - **conversation**: `User:` / `AI:` line prefixes
//! - **generic**: anything else, tagged by phrasing heuristics
//!
//! ## Usage
//!
//! ```no_run
//! use chatdigest::transcript::{FormatTag, TranscriptParser};
//!
//! let parsed = TranscriptParser::default().parse("You said: Hi\nChatGPT said: Hello");
//! assert_eq!(parsed.format_tag, FormatTag::SaidFormat);
//! assert_eq!(parsed.turn_count, 2);
//! ```

mod detect;
mod generic;
mod heuristics;
mod parser;
mod strategies;
mod types;

pub use detect::FormatDetector;
pub use generic::GenericStrategy;
pub use parser::TranscriptParser;
pub use strategies::{
    ConversationStrategy, HeaderedStrategy, ParserStrategy, SaidStrategy, StructuredStrategy,
    strategy_for,
};
pub use types::{FormatTag, ParsedTranscript, Role, Turn, render_turns};
