//! Model abstractions used by the orchestration layer
//!
//! Handlers and chains only see [`ChatModel`] / [`Embedder`], so the live
//! Ollama client can be swapped for a scripted one in tests.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::instrument;

use crate::ollama::{ChatMessage, ChatOptions, ChatResponse, OllamaClient};

/// Anything that can answer a conversation
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Identifier reported in logs and responses
    fn model_name(&self) -> &str;

    /// Send messages with optional per-call option overrides
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: Option<&ChatOptions>,
    ) -> Result<ChatResponse>;

    /// Send messages with the model's default options
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<ChatResponse> {
        self.chat(messages, None).await
    }

    /// Whether the backing runtime is reachable
    async fn health(&self) -> bool {
        true
    }
}

/// Turns text into vectors for semantic search
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

pub type SharedChatModel = Arc<dyn ChatModel>;
pub type SharedEmbedder = Arc<dyn Embedder>;

/// Ollama-backed chat model with default sampling options
#[derive(Debug, Clone)]
pub struct OllamaChat {
    client: OllamaClient,
    model: String,
    defaults: ChatOptions,
}

impl OllamaChat {
    pub fn new(client: OllamaClient, model: impl Into<String>, defaults: ChatOptions) -> Self {
        Self {
            client,
            model: model.into(),
            defaults,
        }
    }

    pub fn defaults(&self) -> &ChatOptions {
        &self.defaults
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: Option<&ChatOptions>,
    ) -> Result<ChatResponse> {
        let options = match options {
            Some(overrides) => self.defaults.merge(overrides),
            None => self.defaults.clone(),
        };
        self.client.chat(&self.model, messages, Some(&options)).await
    }

    async fn health(&self) -> bool {
        self.client.health_check().await.unwrap_or(false)
    }
}

/// Ollama `/api/embed` backed embedder
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.client.embed(&self.model, texts).await
    }
}

/// Offline stand-ins for tests
#[cfg(feature = "testing")]
pub mod testing {
    use std::collections::VecDeque;

    use anyhow::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::{ChatModel, Embedder};
    use crate::ollama::{ChatMessage, ChatOptions, ChatResponse};

    enum Scripted {
        Reply {
            content: String,
            prompt_tokens: Option<u64>,
            completion_tokens: Option<u64>,
        },
        Fail(String),
    }

    /// One recorded call
    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub messages: Vec<ChatMessage>,
        pub options: Option<ChatOptions>,
    }

    /// Replays queued replies in order and records what it was sent
    pub struct ScriptedChatModel {
        name: String,
        replies: Mutex<VecDeque<Scripted>>,
        calls: Mutex<Vec<RecordedCall>>,
        healthy: bool,
    }

    impl ScriptedChatModel {
        pub fn new() -> Self {
            Self {
                name: "scripted".to_string(),
                replies: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
                healthy: true,
            }
        }

        /// Queue replies with no usage data
        pub fn with_replies<I, S>(replies: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            let model = Self::new();
            for reply in replies {
                model.push_reply(reply);
            }
            model
        }

        pub fn unhealthy(mut self) -> Self {
            self.healthy = false;
            self
        }

        pub fn push_reply(&self, content: impl Into<String>) {
            self.replies.lock().push_back(Scripted::Reply {
                content: content.into(),
                prompt_tokens: None,
                completion_tokens: None,
            });
        }

        pub fn push_reply_with_usage(&self, content: impl Into<String>, input: u64, output: u64) {
            self.replies.lock().push_back(Scripted::Reply {
                content: content.into(),
                prompt_tokens: Some(input),
                completion_tokens: Some(output),
            });
        }

        pub fn push_failure(&self, error: impl Into<String>) {
            self.replies.lock().push_back(Scripted::Fail(error.into()));
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }

        pub fn remaining(&self) -> usize {
            self.replies.lock().len()
        }
    }

    impl Default for ScriptedChatModel {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChatModel {
        fn model_name(&self) -> &str {
            &self.name
        }

        async fn chat(
            &self,
            messages: &[ChatMessage],
            options: Option<&ChatOptions>,
        ) -> Result<ChatResponse> {
            self.calls.lock().push(RecordedCall {
                messages: messages.to_vec(),
                options: options.cloned(),
            });

            match self.replies.lock().pop_front() {
                Some(Scripted::Reply {
                    content,
                    prompt_tokens,
                    completion_tokens,
                }) => {
                    let mut response = ChatResponse::from_content(&self.name, content);
                    response.prompt_eval_count = prompt_tokens;
                    response.eval_count = completion_tokens;
                    Ok(response)
                }
                Some(Scripted::Fail(error)) => anyhow::bail!(error),
                None => anyhow::bail!("connection refused: no scripted reply left"),
            }
        }

        async fn health(&self) -> bool {
            self.healthy
        }
    }

    /// Deterministic bag-of-words embedder over a fixed vocabulary
    pub struct KeywordEmbedder {
        vocabulary: Vec<String>,
    }

    impl KeywordEmbedder {
        pub fn new<I, S>(vocabulary: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                vocabulary: vocabulary.into_iter().map(Into::into).collect(),
            }
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|text| {
                    let text = text.to_lowercase();
                    self.vocabulary
                        .iter()
                        .map(|word| text.matches(word.as_str()).count() as f32)
                        .collect()
                })
                .collect())
        }
    }
}
