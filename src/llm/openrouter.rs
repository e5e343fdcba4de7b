//! `OpenRouter` chat-completions client
//!
//! Speaks the `OpenAI`-compatible chat completions wire format. The
//! response is reduced to the single completion text; anything beyond
//! `choices[0].message.content` is ignored.

use super::types::ChatRequest;
use super::{ChatService, LlmError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Large-model completions on a long transcript can take minutes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// `OpenRouter` service implementation
#[derive(Debug)]
pub struct OpenRouterService {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
    /// Optional HTTP-Referer attribution header, recognized by OpenRouter
    referer: Option<String>,
}

impl OpenRouterService {
    pub fn new(
        api_key: impl Into<String>,
        default_model: impl Into<String>,
        base_url: Option<&str>,
        referer: Option<String>,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(LlmError::missing_config("OpenRouter API key is not set"));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            default_model: default_model.into(),
            referer,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn translate_request(request: &ChatRequest) -> WireRequest {
        WireRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
        }
    }

    fn normalize_response(resp: WireResponse) -> Result<String, LlmError> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::malformed("No choices in response"))?;

        choice
            .message
            .content
            .ok_or_else(|| LlmError::malformed("Choice has no message content"))
    }
}

#[async_trait]
impl ChatService for OpenRouterService {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let wire_request = Self::translate_request(request);

        let mut builder = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if let Some(referer) = &self.referer {
            builder = builder.header("HTTP-Referer", referer.clone());
        }

        let response = builder.json(&wire_request).send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::network(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                LlmError::network(format!("Connection failed: {e}"))
            } else {
                LlmError::unknown(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            if let Ok(error_resp) = serde_json::from_str::<WireErrorResponse>(&body) {
                let message = error_resp.error.message;
                return Err(match status.as_u16() {
                    401 | 403 => LlmError::auth(format!("Authentication failed: {message}")),
                    429 => LlmError::rate_limit(format!("Rate limit exceeded: {message}")),
                    400 => LlmError::invalid_request(format!("Invalid request: {message}")),
                    500..=599 => LlmError::server_error(format!("Server error: {message}")),
                    _ => LlmError::unknown(format!("HTTP {status}: {message}")),
                });
            }
            return Err(match status.as_u16() {
                500..=599 => LlmError::server_error(format!("HTTP {status} error: {body}")),
                _ => LlmError::unknown(format!("HTTP {status} error: {body}")),
            });
        }

        let wire_response: WireResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::malformed(format!("Failed to parse response: {e}")))?;

        Self::normalize_response(wire_response)
    }

    fn model_id(&self) -> &str {
        &self.default_model
    }
}

// ============================================================
// Wire types
// ============================================================

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireErrorResponse {
    error: WireErrorBody,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    message: String,
}
