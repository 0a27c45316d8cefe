//! Transport for OpenAI-compatible chat endpoints.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::llm::LlmError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_TOKENS: u32 = 512;
const ERROR_BODY_PREVIEW: usize = 300;

/// Settings for one LLM client, resolved from configuration
#[derive(Debug, Clone)]
pub struct LlmOptions {
    /// Endpoint base URL (the `/chat/completions` path is appended)
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Read timeout per request
    pub timeout: Duration,
    /// Send a `thinking: disabled` hint with each request
    pub disable_reasoning: bool,
    /// Extra user-supplied system prompt, appended to the default
    pub system_prompt: String,
}

/// A chat message in the request payload
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// The assistant message of the first choice
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChatOutput {
    /// Primary content
    pub content: Option<String>,
    /// Secondary reasoning text some models emit alongside (or instead of)
    /// content
    pub reasoning_content: Option<String>,
}

/// Chat client with deterministic sampling and a bounded two-attempt
/// policy: when the reasoning-disable hint is sent and the server answers
/// with an HTTP error, the request is retried exactly once without the
/// hint. There is no other automatic retry.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: Client,
    options: LlmOptions,
}

impl LlmClient {
    /// Build a client from resolved options
    pub fn new(options: LlmOptions) -> Result<Self, LlmError> {
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;
        Ok(Self { http, options })
    }

    /// Compose the effective system prompt: the call site's default plus
    /// the user's preference when configured.
    pub(crate) fn system_prompt(&self, default_prompt: &str) -> String {
        let custom = self.options.system_prompt.trim();
        if custom.is_empty() {
            return default_prompt.to_string();
        }
        format!(
            "{}\n\nAdditional user preference (higher priority unless it conflicts with JSON constraints):\n{}",
            default_prompt, custom
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.options.base_url.trim_end_matches('/'))
    }

    async fn post(&self, payload: &Value) -> Result<reqwest::Response, LlmError> {
        self.http
            .post(self.endpoint())
            .bearer_auth(&self.options.api_key)
            .timeout(self.options.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Request(e.to_string())
                }
            })
    }

    /// Send one chat request and return the first choice's message.
    pub(crate) async fn chat(&self, messages: Vec<ChatMessage>) -> Result<ChatOutput, LlmError> {
        let mut payload = serde_json::json!({
            "model": self.options.model,
            "temperature": 0,
            "max_tokens": MAX_TOKENS,
            "messages": messages,
        });
        if self.options.disable_reasoning {
            payload["thinking"] = serde_json::json!({"type": "disabled"});
        }

        debug!(
            endpoint = %self.endpoint(),
            model = %self.options.model,
            payload_chars = payload.to_string().len(),
            "sending LLM request"
        );
        let mut response = self.post(&payload).await?;

        if response.status().as_u16() >= 400 && self.options.disable_reasoning {
            // Some providers reject the `thinking` field outright; retry
            // once without it.
            debug!(status = response.status().as_u16(), "retrying without thinking field");
            if let Some(map) = payload.as_object_mut() {
                map.remove("thinking");
            }
            response = self.post(&payload).await?;
        }

        let status = response.status();
        if status.as_u16() >= 400 {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(ERROR_BODY_PREVIEW)
                .collect();
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }
        debug!(status = status.as_u16(), "LLM response received");

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|_| LlmError::Protocol("LLM response is not valid JSON.".to_string()))?;
        let choice = parsed
            .choices
            .and_then(|choices| choices.into_iter().next())
            .ok_or_else(|| LlmError::Protocol("LLM response has no choices.".to_string()))?;
        choice
            .message
            .ok_or_else(|| LlmError::Protocol("LLM response choice has no message.".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatOutput>,
}
