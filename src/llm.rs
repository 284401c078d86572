//! LLM provider abstraction
//!
//! The chat flow only talks to [`LlmService`]; the Gemini client is the one
//! production implementation and is always wrapped in [`LoggingService`].

mod error;
mod gemini;
mod models;
mod types;

#[cfg(test)]
pub mod testing;

#[allow(unused_imports)] // LlmErrorKind is matched on in tests
pub use error::{LlmError, LlmErrorKind};
pub use gemini::GeminiService;
pub use models::{all_models, find_model, DEFAULT_MODEL};
pub use types::*;

use crate::config::ChatConfig;
use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Build the configured provider, wrapped with request logging
pub fn build_service(config: &ChatConfig) -> Result<Arc<dyn LlmService>, LlmError> {
    let gemini = GeminiService::new(
        config.api_key.clone(),
        &config.model,
        config.gateway.as_deref(),
        config.request_timeout,
    )?;
    tracing::debug!(endpoint = %gemini.endpoint(), "Gemini client ready");

    Ok(Arc::new(LoggingService::new(Arc::new(gemini))))
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    messages = request.messages.len(),
                    web_search = request.web_search,
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    has_text = response.text.is_some(),
                    finish_reason = response.finish_reason.as_deref().unwrap_or("unknown"),
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = %e.kind,
                    "LLM request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
