//! Prompt template lessons

use axum::extract::State;
use chain_kit::prompt::{
    vars, ChatPromptTemplate, FewShotPromptTemplate, MessageTemplate, PromptTemplate,
};
use serde::Deserialize;
use validator::Validate;

use super::{respond, LessonJson, ValidQuery};
use crate::service::LlmService;
use crate::state::AppState;

const STYLE_TRANSLATION: &str = "Translate the text that is delimited by triple backticks into a style that is {style}. text: ```{text}```

Return only the translated text.
";

const CONTENT_BRIEF: &str = "Write a {style} {content_type} about {subject} for {audience}.

The {content_type} should be approximately {length} words long and have a {tone} tone.

Make it engaging and appropriate for the target audience.";

const SENTIMENT_PREFIX: &str =
    "Classify the sentiment of the following texts as Positive, Negative, or Neutral.\n\nExamples:";

const SENTIMENT_EXAMPLES: [(&str, &str); 3] = [
    ("The weather is beautiful today.", "Positive"),
    ("I'm feeling terrible and everything is going wrong.", "Negative"),
    ("The movie was okay, nothing special.", "Neutral"),
];

#[derive(Debug, Default, Deserialize, Validate)]
pub struct StyleQuery {
    #[validate(length(min = 1))]
    style: Option<String>,
    #[validate(length(min = 1))]
    text: Option<String>,
}

/// Style translation shared by `/api/basic4` and `/api/prompt-templates/basic`
pub(super) async fn style_translation(llm: LlmService, query: StyleQuery) -> LessonJson<String> {
    let prompt = ChatPromptTemplate::from_template(STYLE_TRANSLATION)?;
    let messages = prompt.format_messages(&vars([
        ("style", query.style.unwrap_or_else(|| "slang".into())),
        ("text", query.text.unwrap_or_else(|| "Hello how art thou?".into())),
    ]))?;
    respond(llm.simple_message_with_params(&messages).await?)
}

pub async fn basic(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<StyleQuery>,
) -> LessonJson<String> {
    style_translation(state.llm("/api/prompt-templates/basic"), query).await
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct BriefQuery {
    style: Option<String>,
    content_type: Option<String>,
    subject: Option<String>,
    audience: Option<String>,
    #[validate(range(min = 10, max = 2000))]
    length: Option<u32>,
    tone: Option<String>,
}

pub async fn multi_variable(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<BriefQuery>,
) -> LessonJson<String> {
    let prompt = ChatPromptTemplate::from_template(CONTENT_BRIEF)?;
    let messages = prompt.format_messages(&vars([
        ("style", query.style.unwrap_or_else(|| "professional".into())),
        ("content_type", query.content_type.unwrap_or_else(|| "blog post".into())),
        (
            "subject",
            query
                .subject
                .unwrap_or_else(|| "artificial intelligence in healthcare".into()),
        ),
        ("audience", query.audience.unwrap_or_else(|| "medical professionals".into())),
        ("length", query.length.unwrap_or(100).to_string()),
        ("tone", query.tone.unwrap_or_else(|| "informative".into())),
    ]))?;
    let reply = state
        .llm("/api/prompt-templates/multi-variable")
        .simple_message_with_params(&messages)
        .await?;
    respond(reply)
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct PersonaQuery {
    role: Option<String>,
    behavior: Option<String>,
    style: Option<String>,
    #[validate(length(min = 1))]
    user_input: Option<String>,
}

pub async fn chat(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<PersonaQuery>,
) -> LessonJson<String> {
    let prompt = ChatPromptTemplate::from_messages(vec![
        MessageTemplate::system(
            "You are a {role} who {behavior}. Always respond in a {style} manner.",
        )?,
        MessageTemplate::human("{user_input}")?,
    ]);
    let messages = prompt.format_messages(&vars([
        ("role", query.role.unwrap_or_else(|| "Python programming expert".into())),
        (
            "behavior",
            query
                .behavior
                .unwrap_or_else(|| "explains concepts with code examples".into()),
        ),
        ("style", query.style.unwrap_or_else(|| "clear and concise".into())),
        (
            "user_input",
            query
                .user_input
                .unwrap_or_else(|| "How do I read a CSV file in Python?".into()),
        ),
    ]))?;
    let reply = state
        .llm("/api/prompt-templates/chat")
        .simple_message_with_params(&messages)
        .await?;
    respond(reply)
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct SentimentQuery {
    #[validate(length(min = 1))]
    input: Option<String>,
}

fn sentiment_prompt() -> chain_kit::Result<FewShotPromptTemplate> {
    let examples = SENTIMENT_EXAMPLES
        .iter()
        .map(|(input, output)| vars([("input", *input), ("output", *output)]))
        .collect();
    Ok(FewShotPromptTemplate::new(
        examples,
        PromptTemplate::from_template("\nInput: {input}\nSentiment: {output}\n")?,
        PromptTemplate::from_template("\nInput: {input}\nSentiment:")?,
    )
    .with_prefix(PromptTemplate::from_template(SENTIMENT_PREFIX)?))
}

pub async fn few_shot(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<SentimentQuery>,
) -> LessonJson<String> {
    let input = query
        .input
        .unwrap_or_else(|| "The service was disappointing and slow.".into());
    let prompt = sentiment_prompt()?.format(&vars([("input", input)]))?;
    let reply = state
        .llm("/api/prompt-templates/few-shot")
        .simple_message(&prompt)
        .await?;
    respond(reply.trim().to_string())
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct AdvisorQuery {
    role: Option<String>,
    domain: Option<String>,
    context: Option<String>,
    #[validate(length(min = 1))]
    question: Option<String>,
}

pub async fn composition(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<AdvisorQuery>,
) -> LessonJson<String> {
    let system = MessageTemplate::system("You are a {role} with expertise in {domain}.")?;
    let context = MessageTemplate::human(
        "Context: {context}\n\nPlease keep this context in mind when answering.",
    )?;
    let question = MessageTemplate::human("Question: {question}")?;
    let prompt = ChatPromptTemplate::from_messages(vec![system, context, question]);

    let messages = prompt.format_messages(&vars([
        ("role", query.role.unwrap_or_else(|| "financial advisor".into())),
        ("domain", query.domain.unwrap_or_else(|| "retirement planning".into())),
        (
            "context",
            query.context.unwrap_or_else(|| {
                "The client is 35 years old, earning $80k/year, with $10k in savings.".into()
            }),
        ),
        (
            "question",
            query
                .question
                .unwrap_or_else(|| "What should they prioritize for retirement planning?".into()),
        ),
    ]))?;
    let reply = state
        .llm("/api/prompt-templates/composition")
        .simple_message_with_params(&messages)
        .await?;
    respond(reply)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use llm_core::testing::ScriptedChatModel;
    use llm_core::Role;

    use super::*;
    use crate::routes::router;
    use crate::routes::test_support::get;
    use crate::state::test_support::state_with;

    #[test]
    fn test_sentiment_prompt_layout() {
        let text = sentiment_prompt()
            .unwrap()
            .format(&vars([("input", "Slow service.")]))
            .unwrap();
        assert!(text.starts_with("Classify the sentiment"));
        assert!(text.contains("Input: The weather is beautiful today.\nSentiment: Positive"));
        assert!(text.ends_with("Input: Slow service.\nSentiment:"));
    }

    #[tokio::test]
    async fn test_basic_template_defaults() {
        let model = Arc::new(ScriptedChatModel::with_replies(["Yo, what's good?"]));
        let (status, body) = get(router(state_with(model.clone())), "/api/prompt-templates/basic").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Yo, what's good?");
        let prompt = &model.calls()[0].messages[0].content;
        assert!(prompt.contains("a style that is slang."));
        assert!(prompt.contains("```Hello how art thou?```"));
    }

    #[tokio::test]
    async fn test_multi_variable_rejects_bad_length() {
        let model = Arc::new(ScriptedChatModel::new());
        let app = router(state_with(model.clone()));
        let (status, _) = get(app.clone(), "/api/prompt-templates/multi-variable?length=lots").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = get(app, "/api/prompt-templates/multi-variable?length=5").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_chat_template_roles() {
        let model = Arc::new(ScriptedChatModel::with_replies(["Use the csv module."]));
        let (status, _) = get(
            router(state_with(model.clone())),
            "/api/prompt-templates/chat?user_input=How%20do%20I%20sort%3F",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let messages = &model.calls()[0].messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.starts_with("You are a Python programming expert"));
        assert_eq!(messages[1].content, "How do I sort?");
    }

    #[tokio::test]
    async fn test_few_shot_trims_label() {
        let model = Arc::new(ScriptedChatModel::with_replies([" Negative\n"]));
        let (_, body) = get(router(state_with(model)), "/api/prompt-templates/few-shot").await;
        assert_eq!(body["response"], "Negative");
    }

    #[tokio::test]
    async fn test_composition_keeps_component_order() {
        let model = Arc::new(ScriptedChatModel::with_replies(["Max out the 401k."]));
        let (status, _) = get(router(state_with(model.clone())), "/api/prompt-templates/composition").await;

        assert_eq!(status, StatusCode::OK);
        let messages = &model.calls()[0].messages;
        assert_eq!(messages.len(), 3);
        assert!(messages[1].content.starts_with("Context: The client is 35"));
        assert!(messages[2].content.starts_with("Question: "));
    }
}
