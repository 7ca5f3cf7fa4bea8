//! Map stage: summarize every chunk concurrently on a bounded pool.
//!
//! Each task owns its prompt and reports back tagged with its chunk ordinal.
//! Results land in a slot array indexed by ordinal, so completion order
//! never affects the order summaries reach the reducer. A slot left empty by
//! a failed, timed-out, or panicked task gets the verbatim fallback.

use super::call::generate_bounded;
use super::chunker::{Chunk, context_preamble};
use super::events::{CompressionEvent, EventSink};
use super::pipeline::CompressorConfig;
use super::prompts::map_prompt;
use crate::errors::{CompressError, GenerationError};
use crate::generate::{GenerationOptions, GenerationRequest, Generator};
use crate::transcript::render_turns;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Ordered chunk summaries plus the ordinals that fell back.
#[derive(Debug, Clone, PartialEq)]
pub struct MapOutcome {
    pub summaries: Vec<String>,
    pub failed: Vec<usize>,
}

/// Text standing in for a chunk whose summary could not be produced.
pub fn map_fallback(chunk: &Chunk) -> String {
    format!(
        "[Summary failed for segment {}]\n\n{}",
        chunk.ordinal + 1,
        render_turns(&chunk.turns)
    )
}

pub(crate) async fn map_chunks(
    chunks: &[Chunk],
    generator: &Arc<dyn Generator>,
    config: &CompressorConfig,
    events: &EventSink,
    cancel: &CancellationToken,
) -> Result<MapOutcome, CompressError> {
    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let mut tasks: JoinSet<(usize, Result<String, GenerationError>)> = JoinSet::new();

    for (index, chunk) in chunks.iter().enumerate() {
        let prompt = map_prompt(chunk, &context_preamble(chunks, index));
        let request = GenerationRequest::new(prompt, GenerationOptions::MAP);
        let ordinal = chunk.ordinal;
        let generator = Arc::clone(generator);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        let deadline = config.call_timeout;

        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (ordinal, Err(GenerationError::Cancelled));
            };
            let result = generate_bounded(generator.as_ref(), request, deadline, &cancel).await;
            (ordinal, result)
        });
    }

    let mut slots: Vec<Option<String>> = vec![None; chunks.len()];
    let mut reported = vec![false; chunks.len()];

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tasks.abort_all();
                return Err(CompressError::Cancelled);
            }
            joined = tasks.join_next() => match joined {
                None => break,
                Some(Ok((ordinal, Ok(summary)))) => {
                    debug!(ordinal, chars = summary.len(), "chunk summarized");
                    if let Some(slot) = slots.get_mut(ordinal) {
                        *slot = Some(summary);
                    }
                    mark_reported(&mut reported, ordinal);
                    events.emit(CompressionEvent::ChunkSummarized { ordinal }).await;
                }
                Some(Ok((ordinal, Err(e)))) => {
                    warn!(ordinal, error = %e, "chunk summary failed, keeping turns verbatim");
                    mark_reported(&mut reported, ordinal);
                    events
                        .emit(CompressionEvent::ChunkFailed {
                            ordinal,
                            error: e.to_string(),
                        })
                        .await;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "chunk summary task panicked");
                }
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(CompressError::Cancelled);
    }

    // A panicked task never hands back its ordinal; every other task has
    // reported by now, so the silent slots are exactly the panicked ones.
    for (chunk, _) in chunks.iter().zip(&reported).filter(|(_, done)| !**done) {
        events
            .emit(CompressionEvent::ChunkFailed {
                ordinal: chunk.ordinal,
                error: "summary task panicked".to_string(),
            })
            .await;
    }

    let mut failed = Vec::new();
    let summaries = slots
        .into_iter()
        .zip(chunks)
        .map(|(slot, chunk)| {
            slot.unwrap_or_else(|| {
                failed.push(chunk.ordinal);
                map_fallback(chunk)
            })
        })
        .collect();

    Ok(MapOutcome { summaries, failed })
}

fn mark_reported(reported: &mut [bool], ordinal: usize) {
    if let Some(done) = reported.get_mut(ordinal) {
        *done = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::Chunker;
    use crate::transcript::Turn;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers with the part number it finds in the prompt, sleeping longer
    /// for earlier parts so completions arrive in reverse.
    struct PartEcho {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        fail_part: Option<usize>,
        panic_part: Option<usize>,
    }

    impl PartEcho {
        fn new(fail_part: Option<usize>) -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                fail_part,
                panic_part: None,
            }
        }

        fn panicking_on(part: usize) -> Self {
            Self {
                panic_part: Some(part),
                ..Self::new(None)
            }
        }
    }

    fn part_number(prompt: &str) -> usize {
        let rest = prompt.split("This is part ").nth(1).unwrap();
        rest.split(' ').next().unwrap().parse().unwrap()
    }

    #[async_trait]
    impl Generator for PartEcho {
        async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let part = part_number(&request.prompt);
            tokio::time::sleep(Duration::from_millis(50 / part as u64)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if Some(part) == self.fail_part {
                return Err(GenerationError::Backend("boom".into()));
            }
            if Some(part) == self.panic_part {
                panic!("generator crashed on part {part}");
            }
            Ok(format!("summary {part}"))
        }
    }

    fn chunks(n_turns: usize) -> Vec<Chunk> {
        let turns: Vec<Turn> = (0..n_turns).map(|i| Turn::user(format!("t{i}"))).collect();
        Chunker::new(8, 2).chunk(&turns)
    }

    #[tokio::test]
    async fn test_summaries_in_ordinal_order() {
        let chunks = chunks(40);
        let generator: Arc<dyn Generator> = Arc::new(PartEcho::new(None));
        let outcome = map_chunks(
            &chunks,
            &generator,
            &CompressorConfig::default(),
            &EventSink::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let expected: Vec<String> = (1..=chunks.len()).map(|p| format!("summary {p}")).collect();
        assert_eq!(outcome.summaries, expected);
        assert!(outcome.failed.is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let chunks = chunks(40);
        let echo = Arc::new(PartEcho::new(None));
        let generator: Arc<dyn Generator> = echo.clone();
        let config = CompressorConfig::default().with_concurrency(2);
        map_chunks(
            &chunks,
            &generator,
            &config,
            &EventSink::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(echo.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_failed_chunk_falls_back_verbatim() {
        let chunks = chunks(20);
        let generator: Arc<dyn Generator> = Arc::new(PartEcho::new(Some(2)));
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let outcome = map_chunks(
            &chunks,
            &generator,
            &CompressorConfig::default(),
            &EventSink::new(tx),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.failed, vec![1]);
        assert_eq!(outcome.summaries[0], "summary 1");
        assert!(outcome.summaries[1].starts_with("[Summary failed for segment 2]\n\nUser: t6"));
        assert_eq!(outcome.summaries[2], "summary 3");

        let mut failures = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, CompressionEvent::ChunkFailed { ordinal: 1, .. }) {
                failures += 1;
            }
        }
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn test_panicked_chunk_reports_failure() {
        let chunks = chunks(20);
        let generator: Arc<dyn Generator> = Arc::new(PartEcho::panicking_on(3));
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let outcome = map_chunks(
            &chunks,
            &generator,
            &CompressorConfig::default(),
            &EventSink::new(tx),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.failed, vec![2]);
        assert!(outcome.summaries[2].starts_with("[Summary failed for segment 3]"));

        let mut summarized = 0;
        let mut failed = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                CompressionEvent::ChunkSummarized { .. } => summarized += 1,
                CompressionEvent::ChunkFailed { ordinal, error } => failed.push((ordinal, error)),
                _ => {}
            }
        }
        assert_eq!(summarized, chunks.len() - 1);
        assert_eq!(failed, vec![(2, "summary task panicked".to_string())]);
    }

    #[tokio::test]
    async fn test_cancel_aborts() {
        let chunks = chunks(20);
        let generator: Arc<dyn Generator> = Arc::new(PartEcho::new(None));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = map_chunks(
            &chunks,
            &generator,
            &CompressorConfig::default(),
            &EventSink::default(),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CompressError::Cancelled));
    }

    #[test]
    fn test_map_fallback_text() {
        let chunk = &chunks(2)[0];
        assert_eq!(map_fallback(chunk), "[Summary failed for segment 1]\n\nUser: t0\n\nUser: t1");
    }
}
