//! Transcript compression: `chatdigest compress`.

use anyhow::{Context, Result, bail};
use chatdigest::assemble::PromptAssembler;
use chatdigest::compress::{CompressionResult, Compressor};
use chatdigest::config::DigestConfig;
use chatdigest::generate::{OllamaGenerator, PING_TIMEOUT};
use chatdigest::tokens::{TokenCounter, TokenEstimator, token_limit};
use chatdigest::transcript::TranscriptParser;
use chatdigest::ui::CompressionUI;
use chatdigest::ui::icons::{FILE_NEW, SPARKLE, WARN};
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Arguments of the `Compress` command.
#[derive(Debug)]
pub struct CompressArgs {
    pub file: PathBuf,
    pub target_model: String,
    pub max_tokens: Option<usize>,
    pub ollama_url: Option<String>,
    pub model: Option<String>,
    pub out: Option<Option<PathBuf>>,
}

pub async fn cmd_compress(project_dir: &Path, args: CompressArgs, verbose: bool) -> Result<()> {
    let mut config = DigestConfig::discover(project_dir).context("Failed to load configuration")?;
    if let Some(url) = args.ollama_url {
        config.generation.base_url = url;
    }
    if let Some(model) = args.model {
        config.generation.model = model;
    }
    config.validate().context("Invalid command-line override")?;

    let raw = super::read_transcript(&args.file)?;
    let estimator: Arc<dyn TokenEstimator> = Arc::new(TokenCounter::new());
    let parsed = TranscriptParser::new(estimator.clone()).parse(&raw);
    let budget = args
        .max_tokens
        .unwrap_or_else(|| token_limit(&args.target_model));

    eprintln!(
        "{}Parsed {} turns ({} format, ~{} tokens), budget {} tokens for {}",
        SPARKLE,
        style(parsed.turn_count).cyan(),
        parsed.format_tag,
        parsed.estimated_tokens,
        budget,
        style(&args.target_model).cyan()
    );

    let generator = OllamaGenerator::new(&config.generation.base_url, &config.generation.model)
        .context("Failed to create generation client")?;
    let ping_deadline = PING_TIMEOUT.min(Duration::from_secs(config.generation.timeout_secs));
    if let Err(e) = generator.ping(ping_deadline).await {
        warn!(error = %e, url = generator.base_url(), "generation backend not responding");
        eprintln!(
            "{}Ollama at {} is not responding ({}); summaries will fall back to raw text",
            WARN,
            generator.base_url(),
            e
        );
    }

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let ui = Arc::new(CompressionUI::new(verbose));
    let (tx, mut rx) = mpsc::channel(64);
    let listener = {
        let ui = ui.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                ui.handle(&event);
            }
        })
    };

    let compressor = Compressor::new(Arc::new(generator), estimator.clone())
        .with_config(config.compressor_config())
        .context("Invalid compression settings")?
        .with_event_channel(tx);
    let outcome = compressor
        .compress(&parsed.turns, budget, &args.target_model, &cancel)
        .await;

    // The compressor holds the only sender; the listener ends once it is gone.
    drop(compressor);
    listener.await.ok();
    ctrl_c.abort();

    let result = match outcome {
        Ok(result) => {
            ui.finish("compression complete");
            result
        }
        Err(e) => {
            ui.fail("compression aborted");
            bail!(e);
        }
    };

    let prompt = PromptAssembler::new().assemble(
        &result.compressed_history,
        &result.recent_turns,
        &result.code_fragments,
        &args.target_model,
    );

    match args.out {
        None => println!("{}", prompt),
        Some(path) => {
            let path = path.unwrap_or_else(|| PathBuf::from(default_output_name(&args.target_model)));
            std::fs::write(&path, &prompt)
                .with_context(|| format!("Failed to write prompt to {}", path.display()))?;
            eprintln!("{}Wrote {}", FILE_NEW, style(path.display()).bold());
        }
    }

    print_stats(&result, estimator.estimate(&prompt, Some(&args.target_model)), budget);
    Ok(())
}

/// `chatlog_synthesis_prompt_<model>_<timestamp>.txt`, with path-unsafe
/// characters in the model id replaced.
fn default_output_name(target_model: &str) -> String {
    let model: String = target_model
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    format!("chatlog_synthesis_prompt_{}_{}.txt", model, timestamp)
}

fn print_stats(result: &CompressionResult, prompt_tokens: usize, budget: usize) {
    let stats = &result.stats;
    eprintln!();
    if stats.within_budget {
        eprintln!(
            "  {} transcript fits the budget; all {} turns kept verbatim",
            style("No compression needed:").green(),
            result.recent_turns.len()
        );
    } else {
        let reduction = if stats.original_tokens > 0 {
            100.0 * (1.0 - prompt_tokens as f64 / stats.original_tokens as f64)
        } else {
            0.0
        };
        eprintln!(
            "  tokens:   {} -> {} ({:.1}% reduction)",
            stats.original_tokens,
            style(prompt_tokens).cyan(),
            reduction
        );
        eprintln!(
            "  path:     {}",
            if stats.direct {
                "direct summary".to_string()
            } else {
                format!("{} chunks, {} reduce levels", stats.chunk_count, stats.reduce_levels)
            }
        );
        if !stats.failed_chunks.is_empty() || stats.failed_reduces > 0 {
            eprintln!(
                "  {} {} chunk(s), {} merge(s) fell back to raw text",
                style("degraded:").yellow(),
                stats.failed_chunks.len(),
                stats.failed_reduces
            );
        }
        if stats.fragments_reinjected > 0 {
            eprintln!("  code:     {} fragment(s) re-injected", stats.fragments_reinjected);
        }
    }
    if prompt_tokens > budget {
        eprintln!(
            "  {}prompt is ~{} tokens, over the {} token budget",
            WARN, prompt_tokens, budget
        );
    }
}
