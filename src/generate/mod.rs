//! Text-generation backends.
//!
//! The compression pipeline talks to a model only through the [`Generator`]
//! trait, so tests can substitute a scripted implementation and callers can
//! plug in any backend. [`OllamaGenerator`] is the bundled HTTP adapter.

mod ollama;

pub use ollama::{DEFAULT_BASE_URL, DEFAULT_MODEL, OllamaGenerator, PING_TIMEOUT};

use crate::errors::GenerationError;
use async_trait::async_trait;
use serde::Serialize;

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
}

impl GenerationOptions {
    /// Per-chunk summaries in the map stage.
    pub const MAP: Self = Self {
        temperature: 0.1,
        max_output_tokens: 2048,
        top_p: 0.8,
    };

    /// Reduces whose output is reduced again.
    pub const INTERMEDIATE_REDUCE: Self = Self {
        temperature: 0.1,
        max_output_tokens: 2048,
        top_p: 0.8,
    };

    /// The last reduce, producing the compressed history.
    pub const FINAL_REDUCE: Self = Self {
        temperature: 0.1,
        max_output_tokens: 3072,
        top_p: 0.8,
    };

    /// One-shot summaries of short histories.
    pub const SUMMARY: Self = Self {
        temperature: 0.4,
        max_output_tokens: 4096,
        top_p: 0.9,
    };
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::SUMMARY
    }
}

/// A prompt plus the sampling parameters to run it with.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub options: GenerationOptions,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, options: GenerationOptions) -> Self {
        Self {
            prompt: prompt.into(),
            options,
        }
    }
}

/// Abstraction over a text-generation backend.
/// Real implementation: `OllamaGenerator`. Test double: scripted mocks.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}
