//! Upstream model abstraction
//!
//! A completion is an opaque synchronous exchange: ordered messages in,
//! a single text blob (or classified error) out.

mod error;
mod openrouter;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use openrouter::OpenRouterService;
pub use types::{ChatMessage, ChatRequest, Role};

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for chat completion providers
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Make a completion request, returning the assistant's text
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;

    /// Model used when a session does not specify one
    fn model_id(&self) -> &str;
}

/// Configuration for the upstream provider
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
    pub referer: Option<String>,
}

/// Default free-tier model, matching the original deployment
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1-0528:free";

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("OPENROUTER_API_KEY").ok(),
            model: std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: std::env::var("OPENROUTER_BASE_URL").ok(),
            referer: std::env::var("INTAKE_HTTP_REFERER").ok(),
        }
    }

    /// Build the configured service. Fails with `MissingConfig` when no
    /// API key is present so the problem surfaces at startup, not on
    /// the first patient message.
    pub fn build_service(&self) -> Result<Arc<dyn ChatService>, LlmError> {
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| LlmError::missing_config("OPENROUTER_API_KEY is not set"))?;
        let service = OpenRouterService::new(
            api_key,
            self.model.clone(),
            self.base_url.as_deref(),
            self.referer.clone(),
        )?;
        Ok(Arc::new(LoggingService::new(Arc::new(service))))
    }
}

/// Logging wrapper for chat services
pub struct LoggingService {
    inner: Arc<dyn ChatService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn ChatService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl ChatService for LoggingService {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(text) => {
                tracing::info!(
                    model = %request.model,
                    duration_ms = %duration.as_millis(),
                    messages = request.messages.len(),
                    completion_chars = text.len(),
                    "Completion request succeeded"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %request.model,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "Completion request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
