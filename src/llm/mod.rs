pub mod types;

use thiserror::Error;
use tracing::{debug, instrument};

use types::{ErrorResponse, GenerateRequest, GenerateResponse};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Gemini API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Gemini API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("No response generated from Gemini API")]
    EmptyResponse,
}

/// Client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Send `prompt` and return the text of the first candidate.
    ///
    /// The API key travels as the `key` query parameter and is never logged.
    #[instrument(skip_all, fields(prompt_chars = prompt.len()))]
    pub async fn generate(&self, prompt: &str, api_key: &str) -> Result<String, LlmError> {
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&GenerateRequest::from_prompt(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.error)
                .and_then(|error| error.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());
            debug!(status = status.as_u16(), "Gemini request failed");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<GenerateResponse>().await?;
        debug!(
            candidates = body.candidates.as_ref().map_or(0, Vec::len),
            "received Gemini response"
        );
        body.first_text().ok_or(LlmError::EmptyResponse)
    }
}
