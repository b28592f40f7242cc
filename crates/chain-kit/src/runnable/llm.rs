use async_trait::async_trait;
use llm_core::{ChatMessage, ChatOptions, ChatResponse, SharedChatModel};
use tracing::debug;

use super::Runnable;
use crate::error::{Error, Result};

/// Sends the formatted messages to the chat model
#[derive(Clone)]
pub struct LlmStep {
    model: SharedChatModel,
    options: Option<ChatOptions>,
}

impl LlmStep {
    pub fn new(model: SharedChatModel) -> Self {
        Self {
            model,
            options: None,
        }
    }

    /// Per-step overrides layered over the model defaults
    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = Some(options);
        self
    }
}

#[async_trait]
impl Runnable for LlmStep {
    type Input = Vec<ChatMessage>;
    type Output = ChatResponse;

    async fn invoke(&self, input: Vec<ChatMessage>) -> Result<ChatResponse> {
        debug!(
            model = self.model.model_name(),
            messages = input.len(),
            "Invoking chat model"
        );
        self.model
            .chat(&input, self.options.as_ref())
            .await
            .map_err(Error::Model)
    }
}
