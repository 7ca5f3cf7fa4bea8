//! Token estimation and target-model limits.
//!
//! The pipeline only needs an approximate count to decide whether a
//! transcript fits a budget, so estimation sits behind the
//! [`TokenEstimator`] trait and never fails.
//!
//! ## Usage
//!
//! ```no_run
//! use chatdigest::tokens::{TokenCounter, TokenEstimator, token_limit};
//!
//! let counter = TokenCounter::new();
//! let used = counter.estimate("User: hello there", Some("gpt-4o"));
//! assert!(used <= token_limit("gpt-4o"));
//! ```

mod counter;
mod limits;

pub use counter::{Encoding, EncoderCache, TokenCounter, heuristic_estimate};
pub use limits::{DEFAULT_TOKEN_LIMIT, ModelInfo, catalog, token_limit};

/// Approximate token counting for a text under an optional model id.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str, model: Option<&str>) -> usize;
}
