//! A single generation call under a deadline and a cancellation token.

use crate::errors::GenerationError;
use crate::generate::{GenerationRequest, Generator};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run one request, failing on timeout, cancellation, or a blank response.
pub(crate) async fn generate_bounded(
    generator: &dyn Generator,
    request: GenerationRequest,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<String, GenerationError> {
    let text = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
        result = tokio::time::timeout(deadline, generator.generate(request)) => {
            result.map_err(|_| GenerationError::Timeout(deadline))??
        }
    };

    if text.trim().is_empty() {
        return Err(GenerationError::Backend("empty response".to_string()));
    }
    Ok(text)
}
