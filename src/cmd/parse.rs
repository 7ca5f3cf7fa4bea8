//! Transcript inspection: `chatdigest parse`.

use anyhow::{Context, Result};
use chatdigest::transcript::TranscriptParser;
use chatdigest::util::excerpt;
use console::style;
use std::path::Path;

const PREVIEW_CHARS: usize = 80;

pub fn cmd_parse(file: &Path, json: bool) -> Result<()> {
    let raw = super::read_transcript(file)?;
    let parsed = TranscriptParser::default().parse(&raw);

    if json {
        let out = serde_json::to_string_pretty(&parsed).context("Failed to serialize transcript")?;
        println!("{}", out);
        return Ok(());
    }

    println!();
    println!("{}", style(file.display()).bold());
    println!("  format: {}", style(parsed.format_tag).cyan());
    println!("  turns:  {}", parsed.turn_count);
    println!("  tokens: ~{}", parsed.estimated_tokens);
    println!();

    for (i, turn) in parsed.turns.iter().enumerate() {
        let preview = excerpt(&turn.content.replace('\n', " "), PREVIEW_CHARS);
        println!(
            "  {:>3}  {:<9} {}",
            style(i + 1).dim(),
            style(turn.role).yellow(),
            preview
        );
    }

    Ok(())
}
