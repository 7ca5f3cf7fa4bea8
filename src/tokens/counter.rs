//! BPE-backed token counting with a heuristic fallback.

use super::TokenEstimator;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};
use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

/// Model-id prefixes whose tokenizer is not `cl100k_base`.
const ENCODING_PREFIXES: &[(&str, Encoding)] = &[
    ("text-davinci-003", Encoding::P50k),
    ("text-davinci-002", Encoding::P50k),
    ("code-davinci", Encoding::P50k),
    ("code-cushman", Encoding::P50k),
    ("text-davinci-001", Encoding::R50k),
    ("text-curie", Encoding::R50k),
    ("text-babbage", Encoding::R50k),
    ("text-ada", Encoding::R50k),
];

/// Bare legacy model names using `r50k_base`.
const R50K_MODELS: &[&str] = &["davinci", "curie", "babbage", "ada"];

static WORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+\b").expect("word pattern is valid"));

static SPECIAL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("special char pattern is valid"));

/// BPE vocabularies a model id can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Cl100k,
    P50k,
    R50k,
}

impl Encoding {
    /// Pick the encoding for a model id. Unknown and absent models use `cl100k_base`.
    pub fn for_model(model: Option<&str>) -> Self {
        let Some(model) = model.map(str::trim) else {
            return Encoding::Cl100k;
        };
        if R50K_MODELS.contains(&model) {
            return Encoding::R50k;
        }
        ENCODING_PREFIXES
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix))
            .map_or(Encoding::Cl100k, |(_, encoding)| *encoding)
    }

    fn load(self) -> anyhow::Result<CoreBPE> {
        match self {
            Encoding::Cl100k => tiktoken_rs::cl100k_base(),
            Encoding::P50k => tiktoken_rs::p50k_base(),
            Encoding::R50k => tiktoken_rs::r50k_base(),
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Cl100k => write!(f, "cl100k_base"),
            Encoding::P50k => write!(f, "p50k_base"),
            Encoding::R50k => write!(f, "r50k_base"),
        }
    }
}

/// Loaded BPE encoders, built lazily and kept for the owner's lifetime.
#[derive(Default)]
pub struct EncoderCache {
    encoders: Mutex<HashMap<Encoding, Arc<CoreBPE>>>,
}

impl EncoderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the encoder for `encoding`, loading it on first use.
    ///
    /// A failed load falls back to `cl100k_base`; `None` means no encoder
    /// could be loaded at all.
    pub fn get(&self, encoding: Encoding) -> Option<Arc<CoreBPE>> {
        let mut encoders = self.encoders.lock().ok()?;
        if let Some(bpe) = encoders.get(&encoding) {
            return Some(Arc::clone(bpe));
        }

        match encoding.load() {
            Ok(bpe) => {
                debug!(%encoding, "loaded tokenizer");
                let bpe = Arc::new(bpe);
                encoders.insert(encoding, Arc::clone(&bpe));
                Some(bpe)
            }
            Err(e) if encoding != Encoding::Cl100k => {
                warn!(%encoding, error = %e, "tokenizer unavailable, using cl100k_base");
                drop(encoders);
                self.get(Encoding::Cl100k)
            }
            Err(e) => {
                warn!(error = %e, "no tokenizer available, using heuristic estimate");
                None
            }
        }
    }

    /// Number of encoders currently loaded.
    pub fn loaded(&self) -> usize {
        self.encoders.lock().map(|e| e.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for EncoderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderCache")
            .field("loaded", &self.loaded())
            .finish()
    }
}

/// Token estimator backed by `tiktoken-rs`.
///
/// Build one per process and share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct TokenCounter {
    cache: EncoderCache,
}

impl TokenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count tokens in `text` for `model`.
    pub fn count(&self, text: &str, model: Option<&str>) -> usize {
        if text.is_empty() {
            return 0;
        }
        match self.cache.get(Encoding::for_model(model)) {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => heuristic_estimate(text),
        }
    }
}

impl TokenEstimator for TokenCounter {
    fn estimate(&self, text: &str, model: Option<&str>) -> usize {
        self.count(text, model)
    }
}

/// Tokenizer-free estimate: the larger of a word-based and a character-based
/// guess, rounded up.
pub fn heuristic_estimate(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let words = WORD_REGEX.find_iter(text).count() as f64;
    let special = SPECIAL_REGEX.find_iter(text).count() as f64;
    let chars = text.chars().count() as f64;

    let combined = words * 1.3 + special * 0.5;
    let by_chars = chars * 0.25;
    combined.max(by_chars).ceil() as usize
}
