use crate::compress::CompressionEvent;
use crate::ui::icons::{CHECK, CROSS, MERGE, WARN};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Terminal UI for one compression run, rendered via `indicatif` progress bars.
///
/// Two bars are stacked vertically:
/// - Chunk bar: how many chunk summaries have arrived
/// - Stage spinner: the current stage and reduce level
///
/// Everything is drawn to stderr so stdout stays free for the prompt.
pub struct CompressionUI {
    multi: MultiProgress,
    chunk_bar: ProgressBar,
    stage_bar: ProgressBar,
    verbose: bool,
}

impl CompressionUI {
    /// Create the UI with the spinner already ticking.
    ///
    /// The chunk bar stays empty until a `ChunksPlanned` event sizes it.
    pub fn new(verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let chunk_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let chunk_bar = multi.add(ProgressBar::new(0));
        chunk_bar.set_style(chunk_style);
        chunk_bar.set_prefix("Chunks");

        let stage_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let stage_bar = multi.add(ProgressBar::new_spinner());
        stage_bar.set_style(stage_style);
        stage_bar.set_prefix(" Stage");
        stage_bar.set_message("estimating tokens");
        stage_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            chunk_bar,
            stage_bar,
            verbose,
        }
    }

    /// Print a line above the bars, falling back to `eprintln!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Set the spinner message.
    pub fn stage(&self, msg: &str) {
        self.stage_bar.set_message(msg.to_string());
    }

    /// Update the bars for one pipeline event.
    pub fn handle(&self, event: &CompressionEvent) {
        match event {
            CompressionEvent::ChunksPlanned { total } => {
                self.chunk_bar.set_length(*total as u64);
                self.stage(&format!("summarizing {} chunks", style(total).cyan()));
            }
            CompressionEvent::ChunkSummarized { ordinal } => {
                self.chunk_bar.inc(1);
                if self.verbose {
                    self.print_line(format!(
                        "    {}chunk {} summarized",
                        CHECK,
                        style(ordinal).cyan()
                    ));
                }
            }
            CompressionEvent::ChunkFailed { ordinal, error } => {
                self.chunk_bar.inc(1);
                self.print_line(format!(
                    "    {}chunk {} kept verbatim: {}",
                    WARN,
                    style(ordinal).yellow(),
                    style(error).dim()
                ));
            }
            CompressionEvent::ReduceLevelStarted {
                level,
                inputs,
                is_final,
            } => {
                let what = if *is_final { "final merge" } else { "merging" };
                self.stage(&format!(
                    "{}{} {} summaries (level {})",
                    MERGE,
                    what,
                    style(inputs).cyan(),
                    level
                ));
            }
            CompressionEvent::ReduceFailed { level, error } => {
                self.print_line(format!(
                    "    {}merge at level {} concatenated: {}",
                    WARN,
                    level,
                    style(error).dim()
                ));
            }
            CompressionEvent::Finished { .. } => {
                self.chunk_bar.finish_and_clear();
                self.stage("assembling prompt");
            }
        }
    }

    /// Stop the spinner with a success line.
    pub fn finish(&self, msg: &str) {
        self.chunk_bar.finish_and_clear();
        self.stage_bar
            .finish_with_message(format!("{}{}", CHECK, style(msg).green()));
    }

    /// Stop the spinner with a failure line.
    pub fn fail(&self, msg: &str) {
        self.chunk_bar.abandon();
        self.stage_bar
            .abandon_with_message(format!("{}{}", CROSS, style(msg).red()));
    }
}
