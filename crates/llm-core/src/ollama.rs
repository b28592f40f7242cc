//! Ollama API client

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "system" => Ok(Role::System),
            "user" | "human" => Ok(Role::User),
            "assistant" | "ai" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            other => anyhow::bail!("unknown message role: {other}"),
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Sampling options forwarded to Ollama
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

impl ChatOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
            ..Default::default()
        }
    }

    /// Layer `overrides` on top of `self`; set fields in `overrides` win
    pub fn merge(&self, overrides: &ChatOptions) -> ChatOptions {
        ChatOptions {
            temperature: overrides.temperature.or(self.temperature),
            num_predict: overrides.num_predict.or(self.num_predict),
            top_p: overrides.top_p.or(self.top_p),
            seed: overrides.seed.or(self.seed),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a ChatOptions>,
}

/// Non-streaming chat response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub model: String,
    pub message: ChatMessage,
    #[serde(default)]
    pub done: bool,
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    /// Tokens generated
    #[serde(default)]
    pub eval_count: Option<u64>,
    /// Nanoseconds
    #[serde(default)]
    pub total_duration: Option<u64>,
    /// Nanoseconds
    #[serde(default)]
    pub eval_duration: Option<u64>,
}

/// Token counts reported for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl ChatResponse {
    /// Build an assistant reply without timing data
    pub fn from_content(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            message: ChatMessage::assistant(content),
            done: true,
            prompt_eval_count: None,
            eval_count: None,
            total_duration: None,
            eval_duration: None,
        }
    }

    /// Generated text
    pub fn content(&self) -> &str {
        &self.message.content
    }

    /// Token usage, when the runtime reported both counts
    pub fn usage(&self) -> Option<UsageMetadata> {
        let input_tokens = self.prompt_eval_count?;
        let output_tokens = self.eval_count?;
        Some(UsageMetadata {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama API client
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new client; `timeout` bounds every request
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url: String = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if Ollama is running
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Send a conversation and wait for the complete reply
    #[instrument(skip(self, messages, options), fields(messages = messages.len()))]
    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: Option<&ChatOptions>,
    ) -> Result<ChatResponse> {
        let url = format!("{}/api/chat", self.base_url);

        let req = ChatRequest {
            model,
            messages,
            stream: false,
            options,
        };

        let resp = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .await
            .with_context(|| format!("Failed to connect to Ollama at {}", self.base_url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {status}: {}", body.trim());
        }

        let response: ChatResponse = resp.json().await.context("Failed to parse chat response")?;
        debug!(
            prompt_tokens = response.prompt_eval_count,
            completion_tokens = response.eval_count,
            "Chat completed"
        );
        Ok(response)
    }

    /// Embed a batch of texts
    pub async fn embed(&self, model: &str, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);

        let resp: EmbedResponse = self
            .client
            .post(&url)
            .json(&EmbedRequest { model, input })
            .send()
            .await
            .context("Failed to connect to Ollama")?
            .error_for_status()
            .context("Embedding request failed")?
            .json()
            .await
            .context("Failed to parse embedding response")?;

        if resp.embeddings.len() != input.len() {
            anyhow::bail!(
                "Ollama returned {} embeddings for {} inputs",
                resp.embeddings.len(),
                input.len()
            );
        }

        Ok(resp.embeddings)
    }
}
