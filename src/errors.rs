//! Typed error hierarchy for chatdigest.
//!
//! Three enums cover the three failure surfaces:
//! - `GenerationError`: a single call to the text-generation backend failed
//! - `CompressError`: the compression pipeline was stopped by its caller
//! - `ConfigError`: configuration could not be read or is invalid
//!
//! Parsing has no error type: every parse failure degrades to the generic
//! heuristic parser instead of surfacing.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors from one call to a generation backend.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP request to generation backend failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generation backend returned status {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Generation backend response is missing the '{field}' field")]
    MissingField { field: &'static str },

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Generation failed: {0}")]
    Backend(String),
}

/// Errors from the compression pipeline.
///
/// Backend failures never appear here; they degrade the output instead.
#[derive(Debug, Error)]
pub enum CompressError {
    #[error("Compression cancelled by caller")]
    Cancelled,
}

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: &'static str, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_error_bad_status_carries_body() {
        let err = GenerationError::BadStatus {
            status: 503,
            body: "model not loaded".to_string(),
        };
        match &err {
            GenerationError::BadStatus { status, body } => {
                assert_eq!(*status, 503);
                assert_eq!(body, "model not loaded");
            }
            _ => panic!("Expected BadStatus"),
        }
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("model not loaded"));
    }

    #[test]
    fn generation_error_timeout_mentions_duration() {
        let err = GenerationError::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn generation_error_missing_field_names_field() {
        let err = GenerationError::MissingField { field: "response" };
        assert!(err.to_string().contains("'response'"));
    }

    #[test]
    fn config_error_read_failed_carries_path() {
        let path = PathBuf::from("/etc/chatdigest.toml");
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfigError::ReadFailed {
            path: path.clone(),
            source: io_err,
        };
        match &err {
            ConfigError::ReadFailed { path: p, source } => {
                assert_eq!(p, &path);
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            _ => panic!("Expected ReadFailed"),
        }
    }

    #[test]
    fn config_error_invalid_value_names_key() {
        let err = ConfigError::InvalidValue {
            key: "compression.overlap",
            message: "must be smaller than window".to_string(),
        };
        assert!(err.to_string().contains("compression.overlap"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&GenerationError::Cancelled);
        assert_std_error(&CompressError::Cancelled);
        assert_std_error(&ConfigError::InvalidValue {
            key: "x",
            message: "y".into(),
        });
    }
}
