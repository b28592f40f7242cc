//! Shared application state handed to every handler

use std::sync::Arc;

use chain_kit::memory::ConversationMemory;
use chain_kit::retrieval::{sample_documents, DocumentStore};
use chain_kit::workflow::StepStore;
use llm_core::{ChatModel, SharedChatModel, SharedEmbedder};

use crate::service::LlmService;
use crate::usage::UsageTracker;

#[derive(Clone)]
pub struct AppState {
    llm: LlmService,
    pub embedder: SharedEmbedder,
    pub memory: ConversationMemory,
    pub steps: StepStore,
    pub documents: Arc<DocumentStore>,
    pub usage: UsageTracker,
}

impl AppState {
    pub fn new(
        model: SharedChatModel,
        embedder: SharedEmbedder,
        memory: ConversationMemory,
        steps: StepStore,
    ) -> Self {
        let usage = UsageTracker::new();
        Self {
            llm: LlmService::new(model, usage.clone()),
            embedder,
            memory,
            steps,
            documents: Arc::new(DocumentStore::new(sample_documents())),
            usage,
        }
    }

    /// Model service whose usage is booked against `endpoint`
    pub fn llm(&self, endpoint: &'static str) -> LlmService {
        self.llm.scoped(endpoint)
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }
}
