use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "chatdigest")]
#[command(version, about = "Compress long chat transcripts into continuation prompts")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory searched for chatdigest.toml (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect the format of a transcript and list its turns
    Parse {
        /// Transcript file to read
        file: PathBuf,
        /// Print the parsed transcript as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compress a transcript into a continuation prompt for a target model
    Compress {
        /// Transcript file to read
        file: PathBuf,
        /// Model the prompt is written for
        #[arg(long, default_value = "gpt-4o")]
        target_model: String,
        /// Token budget; defaults to the target model's context limit
        #[arg(long)]
        max_tokens: Option<usize>,
        /// Ollama server used for summaries
        #[arg(long)]
        ollama_url: Option<String>,
        /// Ollama model used for summaries
        #[arg(long)]
        model: Option<String>,
        /// Write the prompt to a file instead of stdout. Without a path a
        /// timestamped name is generated in the current directory.
        #[arg(long, num_args = 0..=1)]
        out: Option<Option<PathBuf>>,
    },
    /// List known target models and their token limits
    Models {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Log to stderr so stdout only ever carries command output.
fn init_tracing(verbose: bool) {
    let default = if verbose { "chatdigest=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match cli.command {
        Commands::Parse { file, json } => cmd::cmd_parse(&file, json)?,
        Commands::Compress {
            file,
            target_model,
            max_tokens,
            ollama_url,
            model,
            out,
        } => {
            let args = cmd::CompressArgs {
                file,
                target_model,
                max_tokens,
                ollama_url,
                model,
                out,
            };
            cmd::cmd_compress(&project_dir, args, cli.verbose).await?;
        }
        Commands::Models { json } => cmd::cmd_models(json)?,
    }

    Ok(())
}
