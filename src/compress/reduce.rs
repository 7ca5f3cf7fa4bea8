//! Hierarchical reduce: merge summaries level by level until one remains.
//!
//! Up to `group_size` summaries go straight to a final reduce. Larger sets
//! are cut, in order, into groups of `group_size`; the groups of one level
//! are reduced concurrently and joined in order before the next level starts.

use super::call::generate_bounded;
use super::events::{CompressionEvent, EventSink};
use super::pipeline::CompressorConfig;
use super::prompts::{SUMMARY_SEPARATOR, reduce_prompt};
use crate::errors::{CompressError, GenerationError};
use crate::generate::{GenerationOptions, GenerationRequest, Generator};
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The merged summary and how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ReduceOutcome {
    pub text: String,
    /// Reduce levels run, including the final one.
    pub levels: usize,
    /// Reduce calls that fell back to concatenation.
    pub failed: usize,
}

/// Text standing in for a reduce call that failed.
pub fn reduce_fallback(summaries: &[String], error: &GenerationError) -> String {
    format!(
        "[Combination failed: {error}]\n\n{}",
        summaries.join(SUMMARY_SEPARATOR)
    )
}

pub(crate) async fn reduce_summaries(
    summaries: Vec<String>,
    generator: &Arc<dyn Generator>,
    config: &CompressorConfig,
    events: &EventSink,
    cancel: &CancellationToken,
) -> Result<ReduceOutcome, CompressError> {
    if summaries.len() <= 1 {
        return Ok(ReduceOutcome {
            text: summaries.into_iter().next().unwrap_or_default(),
            levels: 0,
            failed: 0,
        });
    }

    let group_size = config.group_size;
    let mut current = summaries;
    let mut level = 0;
    let mut failed = 0;

    while current.len() > group_size {
        level += 1;
        debug!(level, inputs = current.len(), "intermediate reduce level");
        events
            .emit(CompressionEvent::ReduceLevelStarted {
                level,
                inputs: current.len(),
                is_final: false,
            })
            .await;

        let reduces = current.chunks(group_size).map(|group| async move {
            if group.len() == 1 {
                return Ok((group[0].clone(), None));
            }
            reduce_once(group, false, generator, config, cancel).await
        });
        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CompressError::Cancelled),
            results = join_all(reduces) => results,
        };

        let mut next = Vec::with_capacity(results.len());
        for result in results {
            let (text, error) = result?;
            if let Some(error) = error {
                failed += 1;
                events.emit(CompressionEvent::ReduceFailed { level, error }).await;
            }
            next.push(text);
        }
        current = next;
    }

    level += 1;
    events
        .emit(CompressionEvent::ReduceLevelStarted {
            level,
            inputs: current.len(),
            is_final: true,
        })
        .await;
    let (text, error) = reduce_once(&current, true, generator, config, cancel).await?;
    if let Some(error) = error {
        failed += 1;
        events.emit(CompressionEvent::ReduceFailed { level, error }).await;
    }

    Ok(ReduceOutcome {
        text,
        levels: level,
        failed,
    })
}

/// One reduce call. A generation failure yields the fallback text and its
/// error message; only cancellation is an error.
async fn reduce_once(
    summaries: &[String],
    is_final: bool,
    generator: &Arc<dyn Generator>,
    config: &CompressorConfig,
    cancel: &CancellationToken,
) -> Result<(String, Option<String>), CompressError> {
    let options = if is_final {
        GenerationOptions::FINAL_REDUCE
    } else {
        GenerationOptions::INTERMEDIATE_REDUCE
    };
    let request = GenerationRequest::new(reduce_prompt(summaries, is_final), options);

    match generate_bounded(generator.as_ref(), request, config.call_timeout, cancel).await {
        Ok(text) => Ok((text, None)),
        Err(GenerationError::Cancelled) => Err(CompressError::Cancelled),
        Err(e) => {
            warn!(inputs = summaries.len(), is_final, error = %e, "reduce failed, concatenating inputs");
            Ok((reduce_fallback(summaries, &e), Some(e.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with the summaries it was given joined by `+`, in brackets.
    #[derive(Default)]
    struct Joiner {
        calls: Mutex<Vec<(usize, u32)>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl Generator for Joiner {
        async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
            let body = request
                .prompt
                .split("Segment summaries to combine:\n")
                .nth(1)
                .unwrap()
                .split("\n\nCombined summary")
                .next()
                .unwrap()
                .to_string();
            let parts: Vec<&str> = body.split(SUMMARY_SEPARATOR).collect();
            self.calls
                .lock()
                .unwrap()
                .push((parts.len(), request.options.max_output_tokens));
            let intermediate = request.options == GenerationOptions::INTERMEDIATE_REDUCE;
            if let Some(bad) = self.fail_on
                && intermediate
                && parts.contains(&bad)
            {
                return Err(GenerationError::Backend("refused".into()));
            }
            Ok(format!("[{}]", parts.join("+")))
        }
    }

    fn inputs(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("s{i}")).collect()
    }

    async fn reduce(n: usize, joiner: Arc<Joiner>) -> ReduceOutcome {
        let generator: Arc<dyn Generator> = joiner;
        reduce_summaries(
            inputs(n),
            &generator,
            &CompressorConfig::default(),
            &EventSink::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_single_summary_passes_through() {
        let joiner = Arc::new(Joiner::default());
        let outcome = reduce(1, joiner.clone()).await;
        assert_eq!(outcome.text, "s1");
        assert_eq!(outcome.levels, 0);
        assert!(joiner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_three_summaries_one_final_reduce() {
        let joiner = Arc::new(Joiner::default());
        let outcome = reduce(3, joiner.clone()).await;
        assert_eq!(outcome.text, "[s1+s2+s3]");
        assert_eq!(outcome.levels, 1);
        assert_eq!(*joiner.calls.lock().unwrap(), vec![(3, 3072)]);
    }

    #[tokio::test]
    async fn test_seven_summaries_two_levels() {
        let joiner = Arc::new(Joiner::default());
        let outcome = reduce(7, joiner.clone()).await;
        // [s1 s2 s3] [s4 s5 s6] [s7] -> final over three.
        assert_eq!(outcome.text, "[[s1+s2+s3]+[s4+s5+s6]+s7]");
        assert_eq!(outcome.levels, 2);
        let calls = joiner.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls.last(), Some(&(3, 3072)));
    }

    #[tokio::test]
    async fn test_more_than_nine_keeps_grouping() {
        let joiner = Arc::new(Joiner::default());
        let outcome = reduce(12, joiner.clone()).await;
        // 12 -> 4 -> 2 -> final.
        assert_eq!(
            outcome.text,
            "[[[s1+s2+s3]+[s4+s5+s6]+[s7+s8+s9]]+[s10+s11+s12]]"
        );
        assert_eq!(outcome.levels, 3);
    }

    #[tokio::test]
    async fn test_failed_reduce_concatenates() {
        let joiner = Arc::new(Joiner {
            fail_on: Some("s5"),
            ..Default::default()
        });
        let outcome = reduce(6, joiner).await;
        assert_eq!(outcome.failed, 1);
        // The final reduce receives the fallback in place of the second group.
        assert!(outcome.text.starts_with("[[s1+s2+s3]+[Combination failed: Generation failed: refused]\n\ns4"));
        assert!(outcome.text.ends_with("s6]"));
    }

    #[tokio::test]
    async fn test_cancelled_reduce() {
        let generator: Arc<dyn Generator> = Arc::new(Joiner::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = reduce_summaries(
            inputs(5),
            &generator,
            &CompressorConfig::default(),
            &EventSink::default(),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CompressError::Cancelled));
    }
}
