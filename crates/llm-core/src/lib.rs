//! llm-core: Shared library for talking to a local Ollama runtime
//!
//! Provides:
//! - Configuration loading (llm.toml + environment)
//! - Ollama API client (chat, embeddings, health)
//! - The `ChatModel` / `Embedder` seams the lesson crates are written against

pub mod config;
pub mod model;
pub mod ollama;

pub use config::Config;
#[cfg(feature = "testing")]
pub use model::testing;
pub use model::{
    ChatModel, Embedder, OllamaChat, OllamaEmbedder, SharedChatModel, SharedEmbedder,
};
pub use ollama::{ChatMessage, ChatOptions, ChatResponse, OllamaClient, Role, UsageMetadata};
