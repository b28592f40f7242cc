//! Tools, function calling, the tool-using agent and question routing

use axum::extract::State;
use chain_kit::agent::{Agent, AgentState, DEFAULT_MAX_ITERATIONS};
use chain_kit::functions::{IntentOutcome, IntentParser};
use chain_kit::routing::{catalog_router, RouteOutcome};
use chain_kit::tools::builtin::{agent_registry, basic_registry, function_registry};
use chain_kit::tools::{ToolDefinition, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use super::{respond, LessonJson, ValidQuery};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ToolsQuery {
    #[validate(range(min = 0.0))]
    radius: Option<f64>,
    #[validate(range(min = -273.15))]
    celsius: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ToolsReply {
    current_time: Value,
    circle_area: Value,
    temperature: Value,
    tools: Vec<ToolDefinition>,
}

async fn output(registry: &ToolRegistry, name: &str, args: Value) -> chain_kit::Result<Value> {
    Ok(registry.invoke(name, &args).await?.output)
}

/// Runs the basic tools directly; no model involved
pub async fn tools(ValidQuery(query): ValidQuery<ToolsQuery>) -> LessonJson<ToolsReply> {
    let registry = basic_registry();
    let radius = query.radius.unwrap_or(5.0);
    let celsius = query.celsius.unwrap_or(25.0);
    respond(ToolsReply {
        current_time: output(&registry, "get_current_time", json!({})).await?,
        circle_area: output(&registry, "calculate_circle_area", json!({"radius": radius})).await?,
        temperature: output(&registry, "convert_temperature", json!({"celsius": celsius})).await?,
        tools: registry.tool_definitions(),
    })
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct IntentQuery {
    #[validate(length(min = 1))]
    input: Option<String>,
}

pub async fn intent_parsing(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<IntentQuery>,
) -> LessonJson<IntentOutcome> {
    let input = query
        .input
        .unwrap_or_else(|| "What's the weather like in London?".into());
    let parser = IntentParser::new(
        state.llm("/api/functions/intent-parsing").shared(),
        function_registry(),
    )?;
    respond(parser.handle(&input).await?)
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct AgentQuery {
    #[validate(length(min = 1))]
    question: Option<String>,
    #[validate(range(min = 1, max = 10))]
    max_iterations: Option<usize>,
}

pub async fn react_simple(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<AgentQuery>,
) -> LessonJson<AgentState> {
    let question = query
        .question
        .unwrap_or_else(|| "What is the square root of 144?".into());
    let agent = Agent::new(
        state.llm("/api/agents/react-simple").shared(),
        agent_registry(),
    )?
    .with_max_iterations(query.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS));
    respond(agent.run(&question).await?)
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RouteQuery {
    #[validate(length(min = 1))]
    question: Option<String>,
}

pub async fn classify(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<RouteQuery>,
) -> LessonJson<RouteOutcome> {
    let question = query
        .question
        .unwrap_or_else(|| "How do I write a for loop in Python?".into());
    let router = catalog_router(state.llm("/api/routing/classify").shared())?;
    respond(router.route(&question).await?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use llm_core::testing::ScriptedChatModel;
    use serde_json::json;

    use crate::routes::router;
    use crate::routes::test_support::get;
    use crate::state::test_support::state_with;

    #[tokio::test]
    async fn test_tools_run_without_model() {
        let model = Arc::new(ScriptedChatModel::new());
        let (status, body) = get(router(state_with(model.clone())), "/api/tools/basic?radius=2").await;

        assert_eq!(status, StatusCode::OK);
        let area = body["response"]["circle_area"].as_f64().unwrap();
        assert!((area - std::f64::consts::PI * 4.0).abs() < 1e-9);
        assert_eq!(
            body["response"]["temperature"],
            json!({"celsius": 25.0, "fahrenheit": 77.0, "kelvin": 298.15})
        );
        assert_eq!(body["response"]["tools"].as_array().unwrap().len(), 3);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_negative_radius_is_400() {
        let model = Arc::new(ScriptedChatModel::new());
        let (status, _) = get(router(state_with(model)), "/api/tools/basic?radius=-1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_intent_parsing_dispatches_weather() {
        let reply = r#"{"function_name": "get_weather", "arguments": {"city": "London"}}"#;
        let model = Arc::new(ScriptedChatModel::with_replies([reply]));
        let (status, body) = get(router(state_with(model)), "/api/functions/intent-parsing").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"]["call"]["function_name"], "get_weather");
        assert_eq!(body["response"]["output"]["success"], true);
    }

    #[tokio::test]
    async fn test_intent_parsing_unknown_function_has_no_output() {
        let reply = r#"{"function_name": "book_flight", "arguments": {}}"#;
        let model = Arc::new(ScriptedChatModel::with_replies([reply]));
        let (status, body) = get(router(state_with(model)), "/api/functions/intent-parsing").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["response"]["output"].is_null());
    }

    #[tokio::test]
    async fn test_agent_uses_calculator_then_answers() {
        let model = Arc::new(ScriptedChatModel::with_replies([
            r#"{"thought": "Compute it", "action": "use_tool", "tool_name": "calculator", "tool_input": {"expression": "sqrt(144)"}}"#,
            r#"{"thought": "Done", "action": "final_answer", "final_answer": "12"}"#,
        ]));
        let (status, body) = get(router(state_with(model.clone())), "/api/agents/react-simple").await;

        assert_eq!(status, StatusCode::OK);
        let response = &body["response"];
        assert_eq!(response["finished"], true);
        assert_eq!(response["final_answer"], "12");
        assert_eq!(response["steps"][0]["observation"], "12");
        assert!(model.calls()[1].messages[0].content.contains("Observation: 12"));
    }

    #[tokio::test]
    async fn test_agent_iteration_cap_is_validated() {
        let model = Arc::new(ScriptedChatModel::new());
        let (status, _) = get(
            router(state_with(model)),
            "/api/agents/react-simple?max_iterations=0",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_routing_answers_with_matching_route() {
        let model = Arc::new(ScriptedChatModel::with_replies([
            r#"{"category": " Technical ", "confidence": "high"}"#,
            "Use `for item in items:`.",
        ]));
        let (status, body) = get(router(state_with(model)), "/api/routing/classify").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"]["classification"]["category"], "technical");
        assert_eq!(body["response"]["routed_to"], "technical");
        assert_eq!(body["response"]["response"], "Use `for item in items:`.");
    }
}
