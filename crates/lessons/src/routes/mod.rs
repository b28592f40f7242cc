//! HTTP routes: one `GET` endpoint per lesson plus health, usage and catalog

mod agents;
mod basic;
mod chains;
mod extract;
mod memory;
mod parsers;
mod prompts;
mod retrieval;
mod system;
mod workflow;

use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

pub use extract::ValidQuery;

/// Body of every lesson endpoint
#[derive(Debug, Serialize)]
pub struct LessonResponse<T> {
    pub response: T,
}

pub type LessonJson<T> = ApiResult<Json<LessonResponse<T>>>;

pub fn respond<T: Serialize>(response: T) -> LessonJson<T> {
    Ok(Json(LessonResponse { response }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(system::health))
        .route("/api/usage", get(system::usage))
        .route("/api/lessons", get(system::lessons))
        // Invocation
        .route("/api/basic", get(basic::basic))
        .route("/api/basic2", get(basic::system_persona))
        .route("/api/basic3", get(basic::usage_metadata))
        .route("/api/basic4", get(basic::translation))
        // Prompt templates
        .route("/api/prompt-templates/basic", get(prompts::basic))
        .route("/api/prompt-templates/multi-variable", get(prompts::multi_variable))
        .route("/api/prompt-templates/chat", get(prompts::chat))
        .route("/api/prompt-templates/few-shot", get(prompts::few_shot))
        .route("/api/prompt-templates/composition", get(prompts::composition))
        // Output parsers
        .route("/api/parsers/comma-list", get(parsers::comma_list))
        .route("/api/parsers/typed", get(parsers::typed))
        .route("/api/parsers/pydantic", get(parsers::typed))
        .route("/api/parsers/nested-json", get(parsers::nested_json))
        .route("/api/parsers/json-list", get(parsers::json_list))
        .route("/api/parsers/json", get(parsers::review_json))
        // Chains and runnables
        .route("/api/chains/basic", get(chains::basic))
        .route("/api/chains/sequential", get(chains::sequential))
        .route("/api/runnable/passthrough", get(chains::passthrough))
        .route("/api/runnable/parallel", get(chains::parallel))
        // Memory
        .route("/api/memory", delete(memory::clear))
        .route("/api/memory/continue", get(memory::continue_conversation))
        .route("/api/memory/history", get(memory::history))
        // Tools, functions, agents, routing
        .route("/api/tools/basic", get(agents::tools))
        .route("/api/functions/intent-parsing", get(agents::intent_parsing))
        .route("/api/agents/react-simple", get(agents::react_simple))
        .route("/api/routing/classify", get(agents::classify))
        // Retrieval
        .route("/api/retrieval/rag", get(retrieval::rag))
        .route("/api/retrieval/semantic", get(retrieval::semantic))
        // Workflows
        .route("/api/langgraph/basic-flow", get(workflow::basic_flow))
        .route("/api/langgraph/workflows/{id}", get(workflow::steps))
        .with_state(state)
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use llm_core::testing::ScriptedChatModel;

    use super::test_support::get;
    use super::*;
    use crate::catalog::LESSONS;
    use crate::state::test_support::state_with;

    #[tokio::test]
    async fn test_every_lesson_is_routed() {
        for lesson in LESSONS {
            let app = router(state_with(Arc::new(ScriptedChatModel::new())));
            let (status, _) = get(app, lesson.endpoint).await;
            assert_ne!(status, StatusCode::NOT_FOUND, "{} not routed", lesson.endpoint);
            assert_ne!(
                status,
                StatusCode::METHOD_NOT_ALLOWED,
                "{} not a GET route",
                lesson.endpoint
            );
        }
    }

    #[tokio::test]
    async fn test_runtime_down_is_503_with_detail() {
        let app = router(state_with(Arc::new(ScriptedChatModel::new())));
        let (status, body) = get(app, "/api/basic").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Ollama unavailable: "));
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let app = router(state_with(Arc::new(ScriptedChatModel::new())));
        let (status, _) = get(app, "/api/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
