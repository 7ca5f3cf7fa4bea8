//! Target-model catalog: `chatdigest models`.

use anyhow::{Context, Result};
use chatdigest::tokens::catalog;
use console::style;

pub fn cmd_models(json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(catalog()).context("Failed to serialize catalog")?;
        println!("{}", out);
        return Ok(());
    }

    println!();
    println!("Target Models");
    println!("=============");
    println!();

    for model in catalog() {
        let marker = if model.recommended {
            style("recommended").green().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:<28} {:<10} {:>9} tokens  {}",
            style(model.id).cyan(),
            model.vendor,
            model.token_limit,
            marker
        );
    }
    println!();

    Ok(())
}
