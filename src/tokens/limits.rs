//! Context-window sizes and the catalog of supported target models.

use serde::Serialize;

/// Budget used for model ids not in the limits table.
pub const DEFAULT_TOKEN_LIMIT: usize = 8000;

const TOKEN_LIMITS: &[(&str, usize)] = &[
    ("gpt-4", 8192),
    ("gpt-4-32k", 32768),
    ("gpt-4-turbo", 128000),
    ("gpt-4o", 128000),
    ("gpt-3.5-turbo", 4096),
    ("gpt-3.5-turbo-16k", 16384),
    ("claude-3-opus", 200000),
    ("claude-3-sonnet", 200000),
    ("claude-3-haiku", 200000),
    ("claude-3.5-sonnet", 200000),
    ("claude-3.7", 200000),
    ("claude-3.7-sonnet", 200000),
    ("gemini-pro", 30720),
    ("gemini-1.5-pro", 1048576),
    ("llama-3-70b", 8192),
    ("llama-3-8b", 8192),
    ("llama-2-70b", 4096),
    ("llama-2-13b", 4096),
    ("llama-2-7b", 4096),
    ("mistral-large", 32000),
    ("mistral-small", 32000),
    ("mistral-7b", 8000),
    ("deepseek-7b", 4096),
    ("deepseek-67b", 4096),
    ("deepseek-r1", 128000),
    ("grok-v3", 1000000),
    ("grok-3", 1000000),
    ("command-r", 128000),
    ("command-r-plus", 128000),
];

/// Context-window size for a target model id.
pub fn token_limit(model: &str) -> usize {
    TOKEN_LIMITS
        .iter()
        .find(|(id, _)| *id == model)
        .map_or(DEFAULT_TOKEN_LIMIT, |(_, limit)| *limit)
}

/// A target model offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub vendor: &'static str,
    pub token_limit: usize,
    pub recommended: bool,
}

const fn model(
    id: &'static str,
    name: &'static str,
    vendor: &'static str,
    token_limit: usize,
    recommended: bool,
) -> ModelInfo {
    ModelInfo {
        id,
        name,
        vendor,
        token_limit,
        recommended,
    }
}

const CATALOG: &[ModelInfo] = &[
    model("gpt-4o", "GPT-4o", "openai", 128000, true),
    model("gpt-4-turbo", "GPT-4 Turbo", "openai", 128000, false),
    model("gpt-4", "GPT-4", "openai", 8192, false),
    model("gpt-3.5-turbo", "GPT-3.5 Turbo", "openai", 16384, false),
    model("claude-3.7-sonnet", "Claude 3.7", "anthropic", 200000, true),
    model("claude-3.5-sonnet", "Claude 3.5 Sonnet", "anthropic", 200000, false),
    model("claude-3-opus", "Claude 3 Opus", "anthropic", 200000, false),
    model("claude-3-haiku", "Claude 3 Haiku", "anthropic", 200000, false),
    model("gemini-1.5-pro", "Gemini 1.5 Pro", "google", 1048576, true),
    model("gemini-pro", "Gemini Pro", "google", 30720, false),
    model("llama-3-70b", "Llama 3 70B", "meta", 8192, true),
    model("llama-3-8b", "Llama 3 8B", "meta", 8192, false),
    model("mistral-large", "Mistral Large", "mistral", 32000, true),
    model("mistral-small", "Mistral Small", "mistral", 32000, false),
    model("grok-3", "Grok-3", "xai", 1000000, false),
    model("deepseek-r1", "DeepSeek R1", "deepseek", 128000, false),
];

/// Known target models, grouped by vendor.
pub fn catalog() -> &'static [ModelInfo] {
    CATALOG
}
