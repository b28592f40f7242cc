//! Classify-then-route: a JSON classification picks which prompt answers

use std::collections::BTreeMap;

use llm_core::{ChatMessage, ChatOptions, SharedChatModel};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::parser::{JsonOutputParser, OutputParser};
use crate::prompt::{vars, ChatPromptTemplate};

const CLASSIFY_PROMPT: &str = "Classify this question into one category:
- technical: Programming, software, computers
- creative: Writing, art, storytelling
- factual: History, geography, general knowledge

{format_instructions}

Question: {question}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RouteClassification {
    /// 'technical', 'creative', or 'factual'
    pub category: String,
    /// 'high', 'medium', or 'low'
    #[serde(default)]
    pub confidence: String,
}

impl RouteClassification {
    fn normalized(self) -> Self {
        Self {
            category: self.category.trim().to_lowercase(),
            confidence: self.confidence.trim().to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteOutcome {
    pub classification: RouteClassification,
    /// Category whose prompt answered, `"fallback"`, or `None` when unrouted
    pub routed_to: Option<String>,
    pub response: Option<String>,
}

pub struct Router {
    model: SharedChatModel,
    classifier: ChatPromptTemplate,
    parser: JsonOutputParser<RouteClassification>,
    routes: BTreeMap<String, ChatPromptTemplate>,
    fallback: Option<ChatPromptTemplate>,
    options: Option<ChatOptions>,
}

impl Router {
    /// `classifier` must take `{question}` and `{format_instructions}`
    pub fn new(model: SharedChatModel, classifier: ChatPromptTemplate) -> Self {
        Self {
            model,
            classifier,
            parser: JsonOutputParser::new(),
            routes: BTreeMap::new(),
            fallback: None,
            options: None,
        }
    }

    /// Answer `category` with `prompt`, which takes `{question}`
    pub fn with_route(mut self, category: impl Into<String>, prompt: ChatPromptTemplate) -> Self {
        self.routes
            .insert(category.into().trim().to_lowercase(), prompt);
        self
    }

    pub fn with_fallback(mut self, prompt: ChatPromptTemplate) -> Self {
        self.fallback = Some(prompt);
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn categories(&self) -> Vec<&str> {
        self.routes.keys().map(String::as_str).collect()
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let response = self
            .model
            .chat(messages, self.options.as_ref())
            .await
            .map_err(Error::Model)?;
        Ok(response.message.content)
    }

    pub async fn classify(&self, question: &str) -> Result<RouteClassification> {
        let messages = self.classifier.format_messages(&vars([
            ("format_instructions", self.parser.format_instructions()),
            ("question", question.to_string()),
        ]))?;
        let text = self.complete(&messages).await?;
        Ok(self.parser.parse(&text)?.normalized())
    }

    #[instrument(skip(self))]
    pub async fn route(&self, question: &str) -> Result<RouteOutcome> {
        let classification = self.classify(question).await?;
        debug!(
            category = %classification.category,
            confidence = %classification.confidence,
            "Classified question"
        );

        let (routed_to, prompt) = match self.routes.get(&classification.category) {
            Some(prompt) => (classification.category.clone(), prompt),
            None => match &self.fallback {
                Some(prompt) => ("fallback".to_string(), prompt),
                None => {
                    info!(category = %classification.category, "No route for category");
                    return Ok(RouteOutcome {
                        classification,
                        routed_to: None,
                        response: None,
                    });
                }
            },
        };

        let messages = prompt.format_messages(&vars([("question", question)]))?;
        let response = self.complete(&messages).await?;
        Ok(RouteOutcome {
            classification,
            routed_to: Some(routed_to),
            response: Some(response),
        })
    }
}

/// technical / creative / factual router with no fallback
pub fn catalog_router(model: SharedChatModel) -> Result<Router> {
    Ok(
        Router::new(model, ChatPromptTemplate::from_template(CLASSIFY_PROMPT)?)
            .with_route(
                "technical",
                ChatPromptTemplate::from_template(
                    "You are a technical expert. Provide a clear answer with examples:\n\n{question}",
                )?,
            )
            .with_route(
                "creative",
                ChatPromptTemplate::from_template(
                    "You are a creative writer. Be imaginative:\n\n{question}",
                )?,
            )
            .with_route(
                "factual",
                ChatPromptTemplate::from_template(
                    "You are knowledgeable. Provide accurate information:\n\n{question}",
                )?,
            ),
    )
}
