/// LLM Client: the single point of entry for chat-completion calls.
///
/// ARCHITECTURAL RULE: No other module may call the completion API directly.
/// All LLM interactions go through a `ChatCompletion` implementation, which is
/// constructed once in `main` and injected through `AppState`.
///
/// The provider speaks the OpenAI-compatible chat-completions protocol (Groq by default).
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

pub mod stream;

/// Extraction must be deterministic across retries of the same file.
const TEMPERATURE: f32 = 0.0;

const BASE_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// A lazy, finite sequence of text fragments. Once consumed the underlying
/// connection is spent; call `ChatCompletion::stream` again for a fresh one.
pub type TokenStream = BoxStream<'static, Result<String, LlmError>>;

/// A system instruction plus user content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// The completion seam. `LlmClient` is the production backend; tests script
/// replies through their own implementations.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Returns the complete response text in one round trip.
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;

    /// Opens a new streamed completion.
    async fn stream(&self, prompt: &Prompt) -> Result<TokenStream, LlmError>;
}

/// Concatenates every fragment of a stream, in order, into one string.
pub async fn collect_stream(mut stream: TokenStream) -> Result<String, LlmError> {
    let mut text = String::new();
    while let Some(fragment) = stream.next().await {
        text.push_str(&fragment?);
    }
    Ok(text)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    stream: bool,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Extracts the text of the first choice.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Chat-completions client with transport-level retry.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_retries: u32,
}

impl LlmClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::builder()
                .timeout(config.llm_timeout())
                .build()
                .expect("Failed to build HTTP client"),
            api_key: config.groq_api_key.clone(),
            base_url: config.llm_base_url.clone(),
            model: config.llm_model.clone(),
            max_retries: config.llm_max_retries,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn request<'a>(&'a self, prompt: &'a Prompt, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            temperature: TEMPERATURE,
            stream,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
        }
    }

    /// Posts a request and returns the successful response.
    /// Retries on 429, 5xx and connection errors with exponential backoff.
    async fn send(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, LlmError> {
        let attempts = self.max_retries.max(1);
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(self.endpoint())
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            attempt += 1;

            let response = match response {
                Ok(r) => r,
                Err(e) if attempt < attempts => {
                    warn!("LLM request failed: {}", e);
                    continue;
                }
                Err(e) => return Err(LlmError::Http(e)),
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                if attempt < attempts {
                    continue;
                }
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: api_error_message(body),
                });
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: api_error_message(body),
                });
            }

            return Ok(response);
        }
    }
}

#[async_trait]
impl ChatCompletion for LlmClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let response = self.send(&self.request(prompt, false)).await?;
        let chat: ChatResponse = response.json().await?;

        if let Some(usage) = &chat.usage {
            debug!(
                "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        chat.text()
            .map(str::to_owned)
            .ok_or(LlmError::EmptyContent)
    }

    async fn stream(&self, prompt: &Prompt) -> Result<TokenStream, LlmError> {
        let response = self.send(&self.request(prompt, true)).await?;
        debug!("LLM stream opened (model: {})", self.model);
        Ok(stream::decode_event_stream(response.bytes_stream()))
    }
}

/// Exponential backoff before retry `attempt` (1-based): 1s, 2s, 4s, ... capped at 30s.
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

/// Pulls the provider's `error.message` out of an error body, falling back to the raw body.
fn api_error_message(body: String) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}
