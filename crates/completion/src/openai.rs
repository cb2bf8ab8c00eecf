//! OpenAI legacy completions engine.
//!
//! Talks to the `/completions` endpoint (prompt in, continuation out) — not
//! `/chat/completions`. The prompt arrives fully assembled; this layer only
//! adds sampling parameters and cleans up the returned text.
//!
//! Works with any OpenAI-compatible endpoint that still serves the legacy
//! route; the base URL is configurable for proxies and self-hosted gateways.

use async_trait::async_trait;
use larkbridge_core::completion::{CompletionEngine, CompletionRequest};
use larkbridge_core::error::CompletionError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Sampling parameters matching the bot's established answer style.
/// High temperature for conversational variety; `#` as a stop sequence.
const TEMPERATURE: f64 = 0.9;
const TOP_P: f64 = 1.0;
const FREQUENCY_PENALTY: f64 = 0.0;
const PRESENCE_PENALTY: f64 = 0.0;
const STOP: &[&str] = &["#"];

/// A completion engine backed by the OpenAI legacy completions API.
pub struct OpenAiEngine {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiEngine {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }

    fn to_api_request(&self, request: &CompletionRequest) -> ApiRequest {
        ApiRequest {
            model: self.model.clone(),
            prompt: request.prompt.clone(),
            max_tokens: request.max_tokens,
            temperature: TEMPERATURE,
            top_p: TOP_P,
            frequency_penalty: FREQUENCY_PENALTY,
            presence_penalty: PRESENCE_PENALTY,
            stop: STOP.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl std::fmt::Debug for OpenAiEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEngine")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl CompletionEngine for OpenAiEngine {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/completions", self.base_url);
        let body = self.to_api_request(&request);

        debug!(model = %self.model, prompt_len = request.prompt.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(e.to_string())
                } else {
                    CompletionError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Completion API returned error");
            return Err(classify_status(status, error_body));
        }

        let api_response: ApiResponse =
            response
                .json()
                .await
                .map_err(|e| CompletionError::ApiError {
                    status_code: 200,
                    message: format!("Failed to parse response: {e}"),
                })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        Ok(clean_answer(&choice.text))
    }
}

/// Map a non-200 status to the error variant the handler distinguishes on.
fn classify_status(status: u16, body: String) -> CompletionError {
    match status {
        429 => CompletionError::RateLimited,
        401 | 403 => CompletionError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        _ => CompletionError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

/// The model opens its continuation with a blank line; strip the first one
/// so the reply does not start with empty space. Later blank lines are part
/// of the answer and stay.
fn clean_answer(text: &str) -> String {
    text.replacen("\n\n", "", 1)
}

// --- API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    prompt: String,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
    frequency_penalty: f64,
    presence_penalty: f64,
    stop: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    text: String,
}
