//! Retrieval-augmented generation over the sample corpus

use axum::extract::State;
use chain_kit::retrieval::{rag_answer, ScoredDocument};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{respond, LessonJson, ValidQuery};
use crate::state::AppState;

const DEFAULT_TOP_K: usize = 2;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RetrievalQuery {
    #[validate(length(min = 1))]
    query: Option<String>,
    #[validate(range(min = 1, max = 10))]
    top_k: Option<usize>,
}

impl RetrievalQuery {
    fn parts(self) -> (String, usize) {
        (
            self.query.unwrap_or_else(|| "What is Python?".into()),
            self.top_k.unwrap_or(DEFAULT_TOP_K),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct RagReply {
    query: String,
    documents: Vec<ScoredDocument>,
    answer: String,
}

/// Keyword-scored retrieval, then the RAG prompt
pub async fn rag(
    State(state): State<AppState>,
    ValidQuery(params): ValidQuery<RetrievalQuery>,
) -> LessonJson<RagReply> {
    let (query, top_k) = params.parts();
    let documents = state.documents.keyword_search(&query, top_k);
    let model = state.llm("/api/retrieval/rag").shared();
    let answer = rag_answer(&model, &query, &documents, None).await?;
    respond(RagReply {
        query,
        documents,
        answer,
    })
}

/// Embedding similarity retrieval, then the RAG prompt
pub async fn semantic(
    State(state): State<AppState>,
    ValidQuery(params): ValidQuery<RetrievalQuery>,
) -> LessonJson<RagReply> {
    let (query, top_k) = params.parts();
    let documents = state
        .documents
        .semantic_search(&state.embedder, &query, top_k)
        .await?;
    let model = state.llm("/api/retrieval/semantic").shared();
    let answer = rag_answer(&model, &query, &documents, None).await?;
    respond(RagReply {
        query,
        documents,
        answer,
    })
}
