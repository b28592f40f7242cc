//! Direct model invocation: plain messages, personas, token counts

use axum::extract::State;
use llm_core::ChatMessage;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::prompts::{style_translation, StyleQuery};
use super::{respond, LessonJson, ValidQuery};
use crate::state::AppState;

const HELLO: &str = "Say hello world in one sentence.";
const SQUIRREL_POEM: &str = "Write me a very short poem about a happy squirrel";

fn persona(style: &str) -> String {
    format!("You are an assistant who responds in the style of {style}.")
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct MessageQuery {
    #[validate(length(min = 1))]
    message: Option<String>,
}

pub async fn basic(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<MessageQuery>,
) -> LessonJson<String> {
    let message = query.message.unwrap_or_else(|| HELLO.to_string());
    let reply = state.llm("/api/basic").simple_message(&message).await?;
    respond(reply)
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct PersonaQuery {
    #[validate(length(min = 1))]
    style: Option<String>,
    #[validate(length(min = 1))]
    message: Option<String>,
}

pub async fn system_persona(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<PersonaQuery>,
) -> LessonJson<String> {
    let style = query.style.as_deref().unwrap_or("Dr Seuss");
    let messages = [
        ChatMessage::system(persona(style)),
        ChatMessage::user(query.message.as_deref().unwrap_or(SQUIRREL_POEM)),
    ];
    let reply = state
        .llm("/api/basic2")
        .simple_message_with_params(&messages)
        .await?;
    respond(reply)
}

/// Token counts are `null` when the runtime does not report them
#[derive(Debug, Serialize)]
pub struct UsageReply {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    total_tokens: Option<u64>,
    content: String,
}

pub async fn usage_metadata(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<PersonaQuery>,
) -> LessonJson<UsageReply> {
    let style = query.style.as_deref().unwrap_or("Shakespeare");
    let messages = [
        ChatMessage::system(persona(style)),
        ChatMessage::user(query.message.as_deref().unwrap_or(SQUIRREL_POEM)),
    ];
    let response = state.llm("/api/basic3").invoke(&messages).await?;
    let usage = response.usage();
    respond(UsageReply {
        input_tokens: usage.map(|u| u.input_tokens),
        output_tokens: usage.map(|u| u.output_tokens),
        total_tokens: usage.map(|u| u.total_tokens),
        content: response.message.content,
    })
}

/// Same style translation as the prompt template lesson, booked under its own endpoint
pub async fn translation(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<StyleQuery>,
) -> LessonJson<String> {
    style_translation(state.llm("/api/basic4"), query).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use llm_core::testing::ScriptedChatModel;
    use llm_core::Role;
    use serde_json::json;

    use crate::routes::router;
    use crate::routes::test_support::get;
    use crate::state::test_support::state_with;

    #[tokio::test]
    async fn test_basic_sends_default_message() {
        let model = Arc::new(ScriptedChatModel::with_replies(["Hello, world!"]));
        let (status, body) = get(router(state_with(model.clone())), "/api/basic").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"response": "Hello, world!"}));
        assert_eq!(model.calls()[0].messages[0].content, "Say hello world in one sentence.");
    }

    #[tokio::test]
    async fn test_basic2_puts_persona_first() {
        let model = Arc::new(ScriptedChatModel::with_replies(["Oh my!"]));
        let (status, _) = get(router(state_with(model.clone())), "/api/basic2").await;

        assert_eq!(status, StatusCode::OK);
        let messages = &model.calls()[0].messages;
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Dr Seuss"));
        assert_eq!(messages[1].role, Role::User);
    }

    #[tokio::test]
    async fn test_basic3_reports_token_counts() {
        let model = ScriptedChatModel::new();
        model.push_reply_with_usage("Hark!", 45, 32);
        let (status, body) = get(router(state_with(Arc::new(model))), "/api/basic3").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"response": {
                "input_tokens": 45,
                "output_tokens": 32,
                "total_tokens": 77,
                "content": "Hark!"
            }})
        );
    }

    #[tokio::test]
    async fn test_basic3_null_counts_when_missing() {
        let model = Arc::new(ScriptedChatModel::with_replies(["Hark!"]));
        let (_, body) = get(router(state_with(model)), "/api/basic3").await;
        assert!(body["response"]["input_tokens"].is_null());
        assert!(body["response"]["total_tokens"].is_null());
    }

    #[tokio::test]
    async fn test_basic4_sends_style_translation() {
        let model = Arc::new(ScriptedChatModel::with_replies(["Yo, what's good?"]));
        let (status, body) = get(router(state_with(model.clone())), "/api/basic4").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"response": "Yo, what's good?"}));
        let messages = &model.calls()[0].messages;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(
            messages[0].content,
            "Translate the text that is delimited by triple backticks into a style that is slang. \
             text: ```Hello how art thou?```\n\nReturn only the translated text.\n"
        );
    }

    #[tokio::test]
    async fn test_basic4_style_override() {
        let model = Arc::new(ScriptedChatModel::with_replies(["Good morrow"]));
        let (status, _) = get(
            router(state_with(model.clone())),
            "/api/basic4?style=Shakespearean&text=Good%20morning",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let prompt = &model.calls()[0].messages[0].content;
        assert!(prompt.contains("a style that is Shakespearean."));
        assert!(prompt.contains("```Good morning```"));
    }

    #[tokio::test]
    async fn test_empty_message_is_400() {
        let model = Arc::new(ScriptedChatModel::new());
        let (status, body) = get(router(state_with(model.clone())), "/api/basic?message=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());
        assert_eq!(model.call_count(), 0);
    }
}
