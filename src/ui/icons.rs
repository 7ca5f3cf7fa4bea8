//! Shared UI icons.
//!
//! Each icon falls back to a plain-text tag on terminals without emoji.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static MERGE: Emoji<'_, '_> = Emoji("🔀 ", "[R]");
pub static FILE_NEW: Emoji<'_, '_> = Emoji("📄 ", "+");
