//! Conversation memory backed by SQLite

use axum::extract::State;
use chain_kit::memory::StoredMessage;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{respond, LessonJson, ValidQuery};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ContinueQuery {
    #[validate(length(min = 1))]
    question: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContinueReply {
    history_used: usize,
    answer: String,
}

pub async fn continue_conversation(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ContinueQuery>,
) -> LessonJson<ContinueReply> {
    let question = query
        .question
        .unwrap_or_else(|| "Can you give me an example of Python automation?".into());
    let model = state.llm("/api/memory/continue").shared();
    let reply = state
        .memory
        .continue_conversation(&model, &question, None)
        .await?;
    respond(ContinueReply {
        history_used: reply.history_used,
        answer: reply.response,
    })
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct HistoryQuery {
    /// Only the most recent `last` messages
    #[validate(range(min = 1, max = 1000))]
    last: Option<usize>,
}

pub async fn history(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<HistoryQuery>,
) -> LessonJson<Vec<StoredMessage>> {
    respond(state.memory.recent(query.last).await?)
}

#[derive(Debug, Serialize)]
pub struct Cleared {
    cleared: usize,
}

pub async fn clear(State(state): State<AppState>) -> LessonJson<Cleared> {
    let cleared = state.memory.reset().await?;
    respond(Cleared { cleared })
}
