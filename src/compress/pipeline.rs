//! The compression pipeline: budget gate, split, map, reduce, fidelity.

use super::call::generate_bounded;
use super::chunker::Chunker;
use super::events::{CompressionEvent, EventSink};
use super::fidelity::{CodeFidelityGuard, CodeFragment};
use super::map::map_chunks;
use super::prompts::summary_prompt;
use super::reduce::reduce_summaries;
use super::{
    DEFAULT_BUDGET_HEADROOM, DEFAULT_CALL_TIMEOUT, DEFAULT_CONCURRENCY, DEFAULT_DIRECT_THRESHOLD,
    DEFAULT_GROUP_SIZE, DEFAULT_MIN_CODE_LEN, DEFAULT_OVERLAP, DEFAULT_PRESERVE_RECENT,
    DEFAULT_WINDOW,
};
use crate::errors::{CompressError, ConfigError, GenerationError};
use crate::generate::{GenerationOptions, GenerationRequest, Generator};
use crate::tokens::TokenEstimator;
use crate::transcript::{Turn, render_turns};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tuning knobs for [`Compressor`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompressorConfig {
    /// Turns per chunk.
    pub window: usize,
    /// Turns shared by adjacent chunks. At most half of `window`.
    pub overlap: usize,
    /// Maximum generation calls in flight during the map stage.
    pub concurrency: usize,
    /// Deadline for each generation call.
    pub call_timeout: Duration,
    /// Trailing turns kept verbatim when the transcript is over budget.
    pub preserve_recent: usize,
    /// Historical prefixes up to this many turns are summarized in one call.
    pub direct_threshold: usize,
    /// Summaries merged per reduce call.
    pub group_size: usize,
    /// Code fragments shorter than this are never re-injected.
    pub min_code_len: usize,
    /// Fraction of the token budget a transcript may use before it is compressed.
    pub budget_headroom: f64,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            overlap: DEFAULT_OVERLAP,
            concurrency: DEFAULT_CONCURRENCY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            preserve_recent: DEFAULT_PRESERVE_RECENT,
            direct_threshold: DEFAULT_DIRECT_THRESHOLD,
            group_size: DEFAULT_GROUP_SIZE,
            min_code_len: DEFAULT_MIN_CODE_LEN,
            budget_headroom: DEFAULT_BUDGET_HEADROOM,
        }
    }
}

impl CompressorConfig {
    /// Set window size and overlap.
    pub fn with_window(mut self, window: usize, overlap: usize) -> Self {
        self.window = window;
        self.overlap = overlap;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_preserve_recent(mut self, turns: usize) -> Self {
        self.preserve_recent = turns;
        self
    }

    pub fn with_direct_threshold(mut self, turns: usize) -> Self {
        self.direct_threshold = turns;
        self
    }

    pub fn with_group_size(mut self, size: usize) -> Self {
        self.group_size = size;
        self
    }

    pub fn with_min_code_len(mut self, chars: usize) -> Self {
        self.min_code_len = chars;
        self
    }

    pub fn with_budget_headroom(mut self, headroom: f64) -> Self {
        self.budget_headroom = headroom;
        self
    }

    /// Reject settings the pipeline cannot finish with.
    ///
    /// Keys in the error name the matching `chatdigest.toml` field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &'static str, message: &str| -> Result<(), ConfigError> {
            Err(ConfigError::InvalidValue {
                key,
                message: message.to_string(),
            })
        };

        if self.window == 0 {
            return invalid("compression.window", "must be at least 1");
        }
        if self.overlap * 2 > self.window {
            return invalid("compression.overlap", "must be at most half of window");
        }
        if self.concurrency == 0 {
            return invalid("compression.concurrency", "must be at least 1");
        }
        if self.group_size < 2 {
            return invalid("compression.group_size", "must be at least 2");
        }
        if !(self.budget_headroom > 0.0 && self.budget_headroom <= 1.0) {
            return invalid("compression.budget_headroom", "must be in (0, 1]");
        }
        if self.call_timeout.is_zero() {
            return invalid("generation.timeout_secs", "must be at least 1");
        }
        Ok(())
    }
}

/// Counters describing one compression run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompressionStats {
    /// Estimated tokens of the full transcript.
    pub original_tokens: usize,
    /// Estimated tokens of the compressed history.
    pub history_tokens: usize,
    /// Nothing was summarized: the transcript fit the budget or had no content.
    pub within_budget: bool,
    /// The history was summarized in one call, without chunking.
    pub direct: bool,
    pub chunk_count: usize,
    /// Ordinals of chunks whose summary fell back to verbatim turns.
    pub failed_chunks: Vec<usize>,
    pub failed_reduces: usize,
    pub reduce_levels: usize,
    pub fragments_reinjected: usize,
}

/// Output of [`Compressor::compress`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionResult {
    /// Summary of the historical prefix; empty when nothing was summarized.
    pub compressed_history: String,
    /// Trailing turns kept verbatim.
    pub recent_turns: Vec<Turn>,
    /// Code found in the historical prefix.
    pub code_fragments: Vec<CodeFragment>,
    pub stats: CompressionStats,
}

/// Compresses a turn sequence into a summary plus a verbatim recent tail.
///
/// Backend failures degrade the output but never fail the run; only
/// caller cancellation surfaces as an error.
pub struct Compressor {
    generator: Arc<dyn Generator>,
    estimator: Arc<dyn TokenEstimator>,
    config: CompressorConfig,
    events: EventSink,
}

impl Compressor {
    pub fn new(generator: Arc<dyn Generator>, estimator: Arc<dyn TokenEstimator>) -> Self {
        Self {
            generator,
            estimator,
            config: CompressorConfig::default(),
            events: EventSink::default(),
        }
    }

    /// Replace the tuning knobs, rejecting values that could never finish.
    pub fn with_config(mut self, config: CompressorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Set the event channel for progress updates.
    pub fn with_event_channel(mut self, tx: mpsc::Sender<CompressionEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }

    /// Compress `turns` to fit `token_budget` tokens of `target_model`.
    pub async fn compress(
        &self,
        turns: &[Turn],
        token_budget: usize,
        target_model: &str,
        cancel: &CancellationToken,
    ) -> Result<CompressionResult, CompressError> {
        if cancel.is_cancelled() {
            return Err(CompressError::Cancelled);
        }

        let original_tokens = self
            .estimator
            .estimate(&render_turns(turns), Some(target_model));
        let allowed = (token_budget as f64 * self.config.budget_headroom) as usize;

        let blank = turns.iter().all(|turn| turn.content.trim().is_empty());
        if original_tokens <= allowed || blank {
            debug!(original_tokens, allowed, blank, "nothing to summarize, keeping all turns");
            let stats = CompressionStats {
                original_tokens,
                within_budget: true,
                ..Default::default()
            };
            self.finish(&stats).await;
            return Ok(CompressionResult {
                compressed_history: String::new(),
                recent_turns: turns.to_vec(),
                code_fragments: Vec::new(),
                stats,
            });
        }

        let recent_len = self.config.preserve_recent.min(turns.len().saturating_sub(1));
        let (historical, recent) = turns.split_at(turns.len() - recent_len);

        let guard = CodeFidelityGuard::new(self.config.min_code_len);
        let code_fragments = guard.extract(historical);

        info!(
            original_tokens,
            token_budget,
            historical = historical.len(),
            recent = recent.len(),
            fragments = code_fragments.len(),
            "compressing transcript"
        );

        let mut stats = CompressionStats {
            original_tokens,
            ..Default::default()
        };

        let summary = if historical.len() <= self.config.direct_threshold {
            self.summarize_directly(historical, &mut stats, cancel).await?
        } else {
            self.summarize_hierarchically(historical, &mut stats, cancel)
                .await?
        };

        let (compressed_history, reinjected) = guard.ensure(&summary, &code_fragments);
        stats.fragments_reinjected = reinjected;
        stats.history_tokens = self
            .estimator
            .estimate(&compressed_history, Some(target_model));

        info!(
            history_tokens = stats.history_tokens,
            chunks = stats.chunk_count,
            failed_chunks = stats.failed_chunks.len(),
            failed_reduces = stats.failed_reduces,
            reinjected,
            "compression finished"
        );
        self.finish(&stats).await;

        Ok(CompressionResult {
            compressed_history,
            recent_turns: recent.to_vec(),
            code_fragments,
            stats,
        })
    }

    async fn summarize_directly(
        &self,
        historical: &[Turn],
        stats: &mut CompressionStats,
        cancel: &CancellationToken,
    ) -> Result<String, CompressError> {
        stats.direct = true;
        stats.chunk_count = 1;
        self.events
            .emit(CompressionEvent::ChunksPlanned { total: 1 })
            .await;

        let request = GenerationRequest::new(summary_prompt(historical), GenerationOptions::SUMMARY);
        match generate_bounded(
            self.generator.as_ref(),
            request,
            self.config.call_timeout,
            cancel,
        )
        .await
        {
            Ok(summary) => {
                self.events
                    .emit(CompressionEvent::ChunkSummarized { ordinal: 0 })
                    .await;
                Ok(summary)
            }
            Err(GenerationError::Cancelled) => Err(CompressError::Cancelled),
            Err(e) => {
                warn!(error = %e, "summary failed, keeping history verbatim");
                stats.failed_chunks.push(0);
                self.events
                    .emit(CompressionEvent::ChunkFailed {
                        ordinal: 0,
                        error: e.to_string(),
                    })
                    .await;
                Ok(format!(
                    "[Summary failed for segment 1]\n\n{}",
                    render_turns(historical)
                ))
            }
        }
    }

    async fn summarize_hierarchically(
        &self,
        historical: &[Turn],
        stats: &mut CompressionStats,
        cancel: &CancellationToken,
    ) -> Result<String, CompressError> {
        let chunks = Chunker::new(self.config.window, self.config.overlap).chunk(historical);
        stats.chunk_count = chunks.len();
        self.events
            .emit(CompressionEvent::ChunksPlanned {
                total: chunks.len(),
            })
            .await;

        let mapped = map_chunks(
            &chunks,
            &self.generator,
            &self.config,
            &self.events,
            cancel,
        )
        .await?;
        stats.failed_chunks = mapped.failed;

        let reduced = reduce_summaries(
            mapped.summaries,
            &self.generator,
            &self.config,
            &self.events,
            cancel,
        )
        .await?;
        stats.failed_reduces = reduced.failed;
        stats.reduce_levels = reduced.levels;

        Ok(reduced.text)
    }

    async fn finish(&self, stats: &CompressionStats) {
        self.events
            .emit(CompressionEvent::Finished {
                history_tokens: stats.history_tokens,
                reinjected_fragments: stats.fragments_reinjected,
            })
            .await;
    }
}
