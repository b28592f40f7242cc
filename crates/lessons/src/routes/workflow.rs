//! Stateful workflow lesson with persisted steps

use axum::extract::{Path, State};
use chain_kit::workflow::{support_flow, StoredStep, SupportState, WorkflowRun};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{respond, LessonJson, ValidQuery};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct FlowQuery {
    #[validate(length(min = 1, max = 2000))]
    input: Option<String>,
}

pub async fn basic_flow(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<FlowQuery>,
) -> LessonJson<WorkflowRun<SupportState>> {
    let input = query
        .input
        .unwrap_or_else(|| "I need help with my recent order. It hasn't arrived yet.".into());
    let flow = support_flow(state.llm("/api/langgraph/basic-flow").shared())?;
    respond(flow.run(&state.steps, SupportState::new(input)).await?)
}

#[derive(Debug, Serialize)]
pub struct WorkflowSteps {
    workflow_id: String,
    steps: Vec<StoredStep>,
}

pub async fn steps(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> LessonJson<WorkflowSteps> {
    let steps = state.steps.fetch(&workflow_id).await?;
    if steps.is_empty() {
        return Err(ApiError::NotFound(format!("workflow {workflow_id} not found")));
    }
    respond(WorkflowSteps { workflow_id, steps })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use llm_core::testing::ScriptedChatModel;

    use crate::routes::router;
    use crate::routes::test_support::get;
    use crate::state::test_support::state_with;

    #[tokio::test]
    async fn test_flow_runs_and_steps_are_persisted() {
        let model = Arc::new(ScriptedChatModel::with_replies([
            " Support\n",
            "Sorry about that, let me check the tracking.",
        ]));
        let app = router(state_with(model.clone()));

        let (status, body) = get(app.clone(), "/api/langgraph/basic-flow").await;
        assert_eq!(status, StatusCode::OK);
        let run = &body["response"];
        assert_eq!(run["state"]["classification"], "support");
        assert_eq!(run["visited"], serde_json::json!(["classify", "respond"]));
        assert!(model.calls()[1].messages[0].content.starts_with("You are a support agent."));

        let workflow_id = run["workflow_id"].as_str().unwrap();
        assert_eq!(workflow_id.len(), 8);
        let (status, body) = get(app, &format!("/api/langgraph/workflows/{workflow_id}")).await;
        assert_eq!(status, StatusCode::OK);
        let steps = body["response"]["steps"].as_array().unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0]["step_name"], "classify");
        assert_eq!(steps[1]["step_data"]["classification"], "support");
    }

    #[tokio::test]
    async fn test_unknown_workflow_is_404() {
        let model = Arc::new(ScriptedChatModel::new());
        let (status, body) = get(router(state_with(model)), "/api/langgraph/workflows/deadbeef").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "workflow deadbeef not found");
    }
}
