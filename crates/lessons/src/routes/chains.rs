//! Chain and runnable lessons

use std::collections::BTreeMap;

use axum::extract::State;
use chain_kit::parser::StrOutputParser;
use chain_kit::prompt::{vars, ChatPromptTemplate, Vars};
use chain_kit::runnable::{Lambda, LlmStep, Parallel, Passthrough, Runnable};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{respond, LessonJson, ValidQuery};
use crate::service::LlmService;
use crate::state::AppState;

const PYTHON_CONTEXT: &str = "Python is a programming language created by Guido van Rossum.";

const CONTEXT_PROMPT: &str = "Original question: {question}
Context: {context}

Answer the question based on the context.";

/// `prompt | llm | StrOutputParser`
fn text_chain(
    llm: &LlmService,
    template: &str,
) -> chain_kit::Result<impl Runnable<Input = Vars, Output = String> + 'static> {
    Ok(ChatPromptTemplate::from_template(template)?
        .pipe(LlmStep::new(llm.shared()))
        .pipe(StrOutputParser))
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct TopicQuery {
    #[validate(length(min = 1))]
    topic: Option<String>,
}

pub async fn basic(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<TopicQuery>,
) -> LessonJson<String> {
    let topic = query.topic.unwrap_or_else(|| "Python programming".into());
    let chain = text_chain(
        &state.llm("/api/chains/basic"),
        "Tell me a short fact about {topic}",
    )?;
    respond(chain.invoke(vars([("topic", topic)])).await?)
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct SubjectQuery {
    #[validate(length(min = 1))]
    subject: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SequentialReply {
    topic: String,
    explanation: String,
}

pub async fn sequential(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<SubjectQuery>,
) -> LessonJson<SequentialReply> {
    let llm = state.llm("/api/chains/sequential");
    let subject = query.subject.unwrap_or_else(|| "space exploration".into());

    let pick_topic = text_chain(
        &llm,
        "Generate a single interesting topic about {subject}. Return only the topic, nothing else.",
    )?;
    let explain = text_chain(&llm, "Write a brief 2-sentence explanation about: {topic}")?;

    let topic = pick_topic
        .invoke(vars([("subject", subject)]))
        .await?
        .trim()
        .to_string();
    let explanation = explain.invoke(vars([("topic", topic.as_str())])).await?;
    respond(SequentialReply { topic, explanation })
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct QuestionQuery {
    #[validate(length(min = 1))]
    question: Option<String>,
}

/// The question passes through untouched while a lambda supplies the context
pub async fn passthrough(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<QuestionQuery>,
) -> LessonJson<String> {
    let question = query.question.unwrap_or_else(|| "Who created Python?".into());
    let chain = Parallel::new()
        .branch("question", Passthrough::<String>::new())
        .branch("context", Lambda::new(|_: String| Ok(PYTHON_CONTEXT.to_string())))
        .pipe(ChatPromptTemplate::from_template(CONTEXT_PROMPT)?)
        .pipe(LlmStep::new(state.llm("/api/runnable/passthrough").shared()))
        .pipe(StrOutputParser);
    respond(chain.invoke(question).await?)
}

pub async fn parallel(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<TopicQuery>,
) -> LessonJson<BTreeMap<String, String>> {
    let llm = state.llm("/api/runnable/parallel");
    let topic = query.topic.unwrap_or_else(|| "cats".into());
    let chain = Parallel::new()
        .branch("joke", text_chain(&llm, "Tell a very short joke about {topic}")?)
        .branch("fact", text_chain(&llm, "Tell me one interesting fact about {topic}")?);
    respond(chain.invoke(vars([("topic", topic)])).await?)
}
