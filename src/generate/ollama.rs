//! Ollama `/api/generate` adapter.

use super::{GenerationOptions, GenerationRequest, Generator};
use crate::errors::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.1:8b";

/// Connect timeout for the HTTP client. Generation itself is bounded by the
/// caller's per-call deadline.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on the startup reachability check. Covers a cold model load.
pub const PING_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
    top_p: f32,
}

impl From<GenerationOptions> for OllamaOptions {
    fn from(opts: GenerationOptions) -> Self {
        Self {
            temperature: opts.temperature,
            num_predict: opts.max_output_tokens,
            top_p: opts.top_p,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Generator backed by a local or remote Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a tiny prompt to check that the server is reachable and the model
    /// loads. A server that accepts the connection but never answers yields
    /// [`GenerationError::Timeout`] once `deadline` passes.
    pub async fn ping(&self, deadline: Duration) -> Result<(), GenerationError> {
        let options = GenerationOptions {
            max_output_tokens: 5,
            ..GenerationOptions::SUMMARY
        };
        tokio::time::timeout(deadline, self.generate(GenerationRequest::new("Hello", options)))
            .await
            .map_err(|_| GenerationError::Timeout(deadline))??;
        Ok(())
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let body = GenerateBody {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            options: request.options.into(),
        };

        debug!(
            model = %self.model,
            prompt_chars = request.prompt.len(),
            num_predict = request.options.max_output_tokens,
            "ollama generate"
        );

        let resp = self.client.post(self.endpoint()).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = resp.json().await?;
        parsed
            .response
            .ok_or(GenerationError::MissingField { field: "response" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let ollama = OllamaGenerator::new("http://localhost:11434/", DEFAULT_MODEL).unwrap();
        assert_eq!(ollama.base_url(), "http://localhost:11434");
        assert_eq!(ollama.endpoint(), "http://localhost:11434/api/generate");
        assert_eq!(ollama.model(), "llama3.1:8b");
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateBody {
            model: "m",
            prompt: "p",
            stream: false,
            options: GenerationOptions::MAP.into(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 2048);
        assert!(json["options"].get("max_output_tokens").is_none());
    }

    #[test]
    fn test_response_without_field() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"done": true}"#).unwrap();
        assert!(parsed.response.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_http_error() {
        let ollama = OllamaGenerator::new("http://127.0.0.1:9", DEFAULT_MODEL).unwrap();
        let err = ollama.ping(PING_TIMEOUT).await.unwrap_err();
        assert!(matches!(err, GenerationError::Http(_)));
    }

    #[tokio::test]
    async fn test_silent_server_ping_times_out() {
        // Accepts connections and reads nothing back.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let ollama = OllamaGenerator::new(format!("http://{addr}"), DEFAULT_MODEL).unwrap();
        let deadline = Duration::from_millis(200);
        let started = std::time::Instant::now();
        let err = ollama.ping(deadline).await.unwrap_err();

        assert!(matches!(err, GenerationError::Timeout(d) if d == deadline));
        assert!(started.elapsed() < Duration::from_secs(5));
        server.abort();
    }
}
