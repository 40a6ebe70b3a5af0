//! Abstractive summaries from a hosted generative-language model.
//!
//! The pipeline talks to the model through [`SummarizationClient`] so tests can swap in a stub. The
//! Gemini-backed client issues a single non-streaming `generateContent` request per call and
//! concatenates the text parts of the first candidate. Transient failures (transport errors,
//! timeouts, 429 and 5xx responses) are retried only when a retry budget is configured.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::Config;

const API_KEY_HEADER: &str = "x-goog-api-key";
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Errors surfaced while requesting a summary.
#[derive(Debug, Error)]
pub enum SummarizationClientError {
    /// Provider could not be reached.
    #[error("Summarization provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider did not answer within the request budget.
    #[error("Summarization request timed out after {seconds}s")]
    Timeout {
        /// Budget that elapsed.
        seconds: u64,
    },
    /// Provider rejected the configured credential.
    #[error("Summarization provider rejected credentials: {0}")]
    Authentication(String),
    /// Provider returned a non-success status.
    #[error("Failed to generate summary ({status}): {message}")]
    GenerationFailed {
        /// HTTP status returned by the provider.
        status: u16,
        /// Response body or error description.
        message: String,
    },
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// Provider answered without any generated text.
    #[error("Provider returned no summary text: {0}")]
    EmptyResponse(String),
}

impl SummarizationClientError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ProviderUnavailable(_) | Self::Timeout { .. } => true,
            Self::GenerationFailed { status, .. } => *status == 429 || *status >= 500,
            Self::Authentication(_) | Self::InvalidResponse(_) | Self::EmptyResponse(_) => false,
        }
    }
}

/// Request payload passed to the summarization provider.
#[derive(Debug, Clone)]
pub struct SummarizationRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Fully rendered prompt.
    pub prompt: String,
}

/// Interface implemented by summarization providers.
#[async_trait]
pub trait SummarizationClient: Send + Sync {
    /// Generate a summary for the supplied prompt.
    async fn generate_summary(
        &self,
        request: SummarizationRequest,
    ) -> Result<String, SummarizationClientError>;
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiSummarizationClient {
    http: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl GeminiSummarizationClient {
    /// Build a client with an explicit endpoint, credential, request timeout, and retry budget.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, SummarizationClientError> {
        let http = Client::builder()
            .user_agent("docsum/summary")
            .timeout(timeout)
            .build()
            .map_err(|error| {
                SummarizationClientError::ProviderUnavailable(format!(
                    "failed to construct HTTP client: {error}"
                ))
            })?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout,
            max_retries,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        })
    }

    /// Build a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, SummarizationClientError> {
        Self::new(
            config.gemini_base_url.clone(),
            config.gemini_api_key.clone(),
            config.summarization_timeout,
            config.summarization_max_retries,
        )
    }

    /// Override the delay between retries; the n-th retry waits `n * backoff`.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{model}:generateContent",
            self.base_url.trim_end_matches('/')
        )
    }

    async fn attempt(&self, request: &SummarizationRequest) -> Result<String, SummarizationClientError> {
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }]
            }]
        });

        let response = self
            .http
            .post(self.endpoint(&request.model))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| self.transport_error(error))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationClientError::Authentication(format!(
                "Gemini returned {status}: {body}"
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationClientError::GenerationFailed {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: GenerateContentResponse = response.json().await.map_err(|error| {
            if error.is_timeout() {
                self.timeout_error()
            } else {
                SummarizationClientError::InvalidResponse(format!(
                    "failed to decode Gemini response: {error}"
                ))
            }
        })?;

        body.into_text()
    }

    fn transport_error(&self, error: reqwest::Error) -> SummarizationClientError {
        if error.is_timeout() {
            return self.timeout_error();
        }
        SummarizationClientError::ProviderUnavailable(format!(
            "failed to reach Gemini at {}: {error}",
            self.base_url
        ))
    }

    fn timeout_error(&self) -> SummarizationClientError {
        SummarizationClientError::Timeout {
            seconds: self.timeout.as_secs(),
        }
    }
}

#[async_trait]
impl SummarizationClient for GeminiSummarizationClient {
    async fn generate_summary(
        &self,
        request: SummarizationRequest,
    ) -> Result<String, SummarizationClientError> {
        let mut attempt = 0;
        loop {
            match self.attempt(&request).await {
                Ok(text) => return Ok(text),
                Err(error) if error.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        error = %error,
                        "Transient summarization failure; retrying"
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Result<String, SummarizationClientError> {
        let block_reason = self
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason);
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = block_reason
                .map(|reason| format!("prompt blocked ({reason})"))
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(SummarizationClientError::EmptyResponse(reason));
        };

        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if text.trim().is_empty() {
            let reason = candidate
                .finish_reason
                .map(|reason| format!("finish reason {reason}"))
                .unwrap_or_else(|| "empty candidate".to_string());
            return Err(SummarizationClientError::EmptyResponse(reason));
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    const PATH: &str = "/v1beta/models/gemini-test:generateContent";

    fn client(server: &MockServer, max_retries: u32) -> GeminiSummarizationClient {
        GeminiSummarizationClient::new(
            server.base_url(),
            "test-key",
            Duration::from_secs(5),
            max_retries,
        )
        .expect("client")
        .with_retry_backoff(Duration::from_millis(10))
    }

    fn request() -> SummarizationRequest {
        SummarizationRequest {
            model: "gemini-test".into(),
            prompt: "Summarize\n\nQuarterly revenue rose 10%.".into(),
        }
    }

    #[tokio::test]
    async fn gemini_client_handles_successful_response() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(PATH)
                    .header(API_KEY_HEADER, "test-key")
                    .json_body(json!({
                        "contents": [{
                            "role": "user",
                            "parts": [{ "text": "Summarize\n\nQuarterly revenue rose 10%." }]
                        }]
                    }));
                then.status(200).json_body(json!({
                    "candidates": [{
                        "content": {
                            "role": "model",
                            "parts": [{ "text": "Revenue grew " }, { "text": "ten percent.\n" }]
                        },
                        "finishReason": "STOP"
                    }]
                }));
            })
            .await;

        let summary = client(&server, 0)
            .generate_summary(request())
            .await
            .expect("summary");

        mock.assert_async().await;
        assert_eq!(summary, "Revenue grew ten percent.\n");
    }

    #[tokio::test]
    async fn gemini_client_handles_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(PATH);
                then.status(500).body("boom");
            })
            .await;

        let error = client(&server, 0)
            .generate_summary(request())
            .await
            .expect_err("error response");

        assert!(matches!(
            error,
            SummarizationClientError::GenerationFailed { status: 500, ref message } if message == "boom"
        ));
    }

    #[tokio::test]
    async fn gemini_client_reports_rejected_credentials() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path(PATH);
                then.status(403).body("API key not valid");
            })
            .await;

        let error = client(&server, 3)
            .generate_summary(request())
            .await
            .expect_err("auth failure");

        assert!(matches!(error, SummarizationClientError::Authentication(_)));
        assert!(!error.is_transient());
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn gemini_client_reports_blocked_prompt() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(PATH);
                then.status(200).json_body(json!({
                    "promptFeedback": { "blockReason": "SAFETY" }
                }));
            })
            .await;

        let error = client(&server, 0)
            .generate_summary(request())
            .await
            .expect_err("blocked");

        assert!(
            matches!(error, SummarizationClientError::EmptyResponse(ref reason) if reason.contains("SAFETY"))
        );
    }

    #[tokio::test]
    async fn gemini_client_rejects_malformed_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(PATH);
                then.status(200).body("not json");
            })
            .await;

        let error = client(&server, 2)
            .generate_summary(request())
            .await
            .expect_err("malformed");

        assert!(matches!(error, SummarizationClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn gemini_client_retries_transient_failures_up_to_budget() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path(PATH);
                then.status(503).body("overloaded");
            })
            .await;

        let error = client(&server, 2)
            .generate_summary(request())
            .await
            .expect_err("still failing");

        assert!(error.is_transient());
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn gemini_client_does_not_retry_without_budget() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path(PATH);
                then.status(429).body("quota");
            })
            .await;

        client(&server, 0)
            .generate_summary(request())
            .await
            .expect_err("rate limited");

        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn unreachable_provider_is_unavailable() {
        let client = GeminiSummarizationClient::new(
            "http://127.0.0.1:9",
            "test-key",
            Duration::from_secs(2),
            0,
        )
        .expect("client");

        let error = client
            .generate_summary(request())
            .await
            .expect_err("unreachable");

        assert!(matches!(
            error,
            SummarizationClientError::ProviderUnavailable(_) | SummarizationClientError::Timeout { .. }
        ));
    }

    #[test]
    fn transient_classification() {
        assert!(SummarizationClientError::ProviderUnavailable("x".into()).is_transient());
        assert!(SummarizationClientError::Timeout { seconds: 1 }.is_transient());
        assert!(
            SummarizationClientError::GenerationFailed {
                status: 502,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !SummarizationClientError::GenerationFailed {
                status: 400,
                message: String::new()
            }
            .is_transient()
        );
        assert!(!SummarizationClientError::InvalidResponse("x".into()).is_transient());
    }
}
