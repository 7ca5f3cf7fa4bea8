//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `parse`    | `Parse`          |
//! | `compress` | `Compress`       |
//! | `models`   | `Models`         |

pub mod compress;
pub mod models;
pub mod parse;

pub use compress::{CompressArgs, cmd_compress};
pub use models::cmd_models;
pub use parse::cmd_parse;

use anyhow::{Context, Result};
use std::path::Path;

/// Read a transcript file as UTF-8.
fn read_transcript(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript {}", path.display()))
}
