//! Configuration for chatdigest.
//!
//! Settings are layered, later layers winning:
//!
//! 1. Built-in defaults
//! 2. The first config file found: `./chatdigest.toml`, then
//!    `~/.config/chatdigest/config.toml`
//! 3. Environment: `CHATDIGEST_OLLAMA_URL`, `CHATDIGEST_MODEL`
//! 4. Command-line flags (applied by the binary)
//!
//! # Configuration File Format
//!
//! ```toml
//! [generation]
//! base_url = "http://localhost:11434"
//! model = "llama3.1:8b"
//! timeout_secs = 120
//!
//! [compression]
//! window = 8
//! overlap = 2
//! concurrency = 3
//! preserve_recent = 3
//! direct_threshold = 12
//! group_size = 3
//! min_code_len = 20
//! budget_headroom = 0.9
//! ```

use crate::compress::{
    CompressorConfig, DEFAULT_BUDGET_HEADROOM, DEFAULT_CALL_TIMEOUT, DEFAULT_CONCURRENCY,
    DEFAULT_DIRECT_THRESHOLD, DEFAULT_GROUP_SIZE, DEFAULT_MIN_CODE_LEN, DEFAULT_OVERLAP,
    DEFAULT_PRESERVE_RECENT, DEFAULT_WINDOW,
};
use crate::errors::ConfigError;
use crate::generate::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Project-local config file name.
pub const PROJECT_CONFIG_FILE: &str = "chatdigest.toml";

pub const ENV_OLLAMA_URL: &str = "CHATDIGEST_OLLAMA_URL";
pub const ENV_MODEL: &str = "CHATDIGEST_MODEL";

/// `[generation]`: where summaries come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Deadline for each generation call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_CALL_TIMEOUT.as_secs()
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// `[compression]`: pipeline tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionSection {
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_preserve_recent")]
    pub preserve_recent: usize,
    #[serde(default = "default_direct_threshold")]
    pub direct_threshold: usize,
    #[serde(default = "default_group_size")]
    pub group_size: usize,
    #[serde(default = "default_min_code_len")]
    pub min_code_len: usize,
    #[serde(default = "default_budget_headroom")]
    pub budget_headroom: f64,
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_preserve_recent() -> usize {
    DEFAULT_PRESERVE_RECENT
}

fn default_direct_threshold() -> usize {
    DEFAULT_DIRECT_THRESHOLD
}

fn default_group_size() -> usize {
    DEFAULT_GROUP_SIZE
}

fn default_min_code_len() -> usize {
    DEFAULT_MIN_CODE_LEN
}

fn default_budget_headroom() -> f64 {
    DEFAULT_BUDGET_HEADROOM
}

impl Default for CompressionSection {
    fn default() -> Self {
        Self {
            window: default_window(),
            overlap: default_overlap(),
            concurrency: default_concurrency(),
            preserve_recent: default_preserve_recent(),
            direct_threshold: default_direct_threshold(),
            group_size: default_group_size(),
            min_code_len: default_min_code_len(),
            budget_headroom: default_budget_headroom(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub compression: CompressionSection,
}

impl DigestConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse configuration from a TOML string; `path` is only used in errors.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `~/.config/chatdigest/config.toml`, when a config dir exists.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chatdigest").join("config.toml"))
    }

    /// Resolve the effective configuration for `project_dir`: first config
    /// file found, then environment overrides, then validation.
    pub fn discover(project_dir: &Path) -> Result<Self, ConfigError> {
        let candidates = std::iter::once(project_dir.join(PROJECT_CONFIG_FILE))
            .chain(Self::user_config_path());

        let mut config = Self::default();
        for path in candidates {
            if path.is_file() {
                debug!(path = %path.display(), "loading config");
                config = Self::load(&path)?;
                break;
            }
        }

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `CHATDIGEST_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_OLLAMA_URL).filter(|v| !v.trim().is_empty()) {
            self.generation.base_url = url;
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|v| !v.trim().is_empty()) {
            self.generation.model = model;
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "generation.timeout_secs",
                message: "must be at least 1".to_string(),
            });
        }
        if self.generation.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "generation.base_url",
                message: "must not be empty".to_string(),
            });
        }
        self.compressor_config().validate()
    }

    /// Pipeline settings derived from this configuration.
    pub fn compressor_config(&self) -> CompressorConfig {
        let c = &self.compression;
        CompressorConfig::default()
            .with_window(c.window, c.overlap)
            .with_concurrency(c.concurrency)
            .with_call_timeout(Duration::from_secs(self.generation.timeout_secs))
            .with_preserve_recent(c.preserve_recent)
            .with_direct_threshold(c.direct_threshold)
            .with_group_size(c.group_size)
            .with_min_code_len(c.min_code_len)
            .with_budget_headroom(c.budget_headroom)
    }
}
