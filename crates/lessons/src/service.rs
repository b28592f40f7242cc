//! Service layer between the HTTP handlers and the chat model
//!
//! Handlers get an [`LlmService`] scoped to their endpoint so every model
//! call, including those made inside chains and agents, is counted against
//! that endpoint in the [`UsageTracker`].

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use llm_core::{ChatMessage, ChatModel, ChatOptions, ChatResponse, SharedChatModel};
use tracing::debug;

use crate::usage::UsageTracker;

#[derive(Clone)]
pub struct LlmService {
    model: SharedChatModel,
    usage: UsageTracker,
    endpoint: &'static str,
}

impl LlmService {
    pub fn new(model: SharedChatModel, usage: UsageTracker) -> Self {
        Self {
            model,
            usage,
            endpoint: "unscoped",
        }
    }

    /// Same model, usage recorded under `endpoint`
    pub fn scoped(&self, endpoint: &'static str) -> Self {
        Self {
            endpoint,
            ..self.clone()
        }
    }

    /// This service as a model handle for chains, agents and workflows
    pub fn shared(&self) -> SharedChatModel {
        Arc::new(self.clone())
    }

    /// Send one human message and return the reply text
    pub async fn simple_message(&self, text: &str) -> Result<String> {
        Ok(self.invoke(&[ChatMessage::user(text)]).await?.message.content)
    }

    /// Send a prepared message list (system + human) and return the reply text
    pub async fn simple_message_with_params(&self, messages: &[ChatMessage]) -> Result<String> {
        Ok(self.invoke(messages).await?.message.content)
    }

    /// Full response, including token counts
    pub async fn invoke(&self, messages: &[ChatMessage]) -> Result<ChatResponse> {
        self.chat(messages, None).await
    }
}

#[async_trait]
impl ChatModel for LlmService {
    fn model_name(&self) -> &str {
        self.model.model_name()
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: Option<&ChatOptions>,
    ) -> Result<ChatResponse> {
        let response = self.model.chat(messages, options).await?;
        let usage = response.usage();
        debug!(
            endpoint = self.endpoint,
            input_tokens = usage.map(|u| u.input_tokens),
            output_tokens = usage.map(|u| u.output_tokens),
            "Model call completed"
        );
        self.usage.record(self.endpoint, usage);
        Ok(response)
    }

    async fn health(&self) -> bool {
        self.model.health().await
    }
}
