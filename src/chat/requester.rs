//! One outbound call per exchange, carrying the whole conversation

use crate::conversation::{Message, Origin};
use crate::llm::{LlmError, LlmMessage, LlmRequest, LlmService};
use std::sync::Arc;

/// Appended in place of a reply that carried no text or whose request failed
pub const SENTINEL_REPLY: &str = "null";

/// Sends the replayed history to the model and returns its text
#[derive(Clone)]
pub struct ResponseRequester {
    service: Arc<dyn LlmService>,
    web_search: bool,
    max_output_tokens: Option<u32>,
}

impl ResponseRequester {
    pub fn new(service: Arc<dyn LlmService>, web_search: bool) -> Self {
        Self {
            service,
            web_search,
            max_output_tokens: None,
        }
    }

    /// Cap the length of every reply; `None` leaves it to the provider
    #[must_use]
    pub fn with_max_output_tokens(mut self, max_output_tokens: Option<u32>) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn model_id(&self) -> &str {
        self.service.model_id()
    }

    /// Request a reply to `conversation`.
    ///
    /// A response without text resolves to [`SENTINEL_REPLY`].
    pub async fn request(&self, conversation: &[Message]) -> Result<String, LlmError> {
        let request = self.build_request(conversation);
        let response = self.service.complete(&request).await?;
        Ok(response
            .text
            .unwrap_or_else(|| SENTINEL_REPLY.to_string()))
    }

    fn build_request(&self, conversation: &[Message]) -> LlmRequest {
        let messages = conversation
            .iter()
            .map(|message| match message.origin() {
                Origin::User => LlmMessage::user(message.text()),
                Origin::Model => LlmMessage::model(message.text()),
            })
            .collect();

        LlmRequest {
            messages,
            web_search: self.web_search,
            max_tokens: self.max_output_tokens,
        }
    }
}
