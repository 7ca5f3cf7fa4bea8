//! Context-preserving compression of long transcripts.
//!
//! This module shrinks a turn sequence to fit a token budget while keeping
//! the most recent turns verbatim and every code fragment intact.
//!
//! ## Stages
//!
//! 1. **Budget gate**: transcripts that already fit are passed through.
//! 2. **Split**: the last few turns are held back verbatim; the rest is history.
//! 3. **Fidelity extract**: code fragments are recorded from the history.
//! 4. **Map**: the history is cut into overlapping chunks, each summarized
//!    concurrently with a note on where it sits in the conversation.
//! 5. **Reduce**: chunk summaries are merged in order, level by level.
//! 6. **Fidelity ensure**: code the summary dropped is appended verbatim.
//!
//! Short histories skip chunking and go through a single summary call.
//! Every generation failure has a fallback, so a run always produces a
//! history; only cancellation aborts it.
//!
//! ## Usage
//!
//! ```no_run
//! use chatdigest::compress::Compressor;
//! use chatdigest::generate::OllamaGenerator;
//! use chatdigest::tokens::TokenCounter;
//! use chatdigest::transcript::TranscriptParser;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let parsed = TranscriptParser::default().parse("User: hi\nAssistant: hello");
//! let generator = Arc::new(OllamaGenerator::new("http://localhost:11434", "llama3.1:8b")?);
//! let compressor = Compressor::new(generator, Arc::new(TokenCounter::new()));
//! let result = compressor
//!     .compress(&parsed.turns, 8000, "gpt-4o", &CancellationToken::new())
//!     .await?;
//! println!("{}", result.compressed_history);
//! # Ok(())
//! # }
//! ```

mod call;
mod chunker;
mod events;
mod fidelity;
mod map;
mod pipeline;
mod prompts;
mod reduce;

use std::time::Duration;

pub use chunker::{Chunk, Chunker, context_preamble};
pub use events::CompressionEvent;
pub use fidelity::{
    CodeFidelityGuard, CodeFragment, FragmentKind, MISSING_CODE_HEADER, contains_fragment,
};
pub use map::{MapOutcome, map_fallback};
pub use pipeline::{CompressionResult, CompressionStats, Compressor, CompressorConfig};
pub use prompts::{SUMMARY_SEPARATOR, map_prompt, reduce_prompt, summary_prompt};
pub use reduce::{ReduceOutcome, reduce_fallback};

/// Default turns per chunk.
pub const DEFAULT_WINDOW: usize = 8;

/// Default turns shared by adjacent chunks.
pub const DEFAULT_OVERLAP: usize = 2;

/// Default generation calls in flight during the map stage.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Default deadline for one generation call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Default trailing turns kept verbatim.
pub const DEFAULT_PRESERVE_RECENT: usize = 3;

/// Historical prefixes up to this many turns skip chunking.
pub const DEFAULT_DIRECT_THRESHOLD: usize = 12;

/// Default summaries merged per reduce call.
pub const DEFAULT_GROUP_SIZE: usize = 3;

/// Code fragments shorter than this many characters are not re-injected.
pub const DEFAULT_MIN_CODE_LEN: usize = 20;

/// Default fraction of the budget a transcript may use uncompressed.
pub const DEFAULT_BUDGET_HEADROOM: f64 = 0.9;
