//! Intent parsing: the model picks a function and its arguments as JSON,
//! then the call is dispatched through a [`ToolRegistry`].

use llm_core::{ChatOptions, SharedChatModel};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::parser::{JsonOutputParser, OutputParser};
use crate::prompt::{vars, ChatPromptTemplate};
use crate::tools::{ToolRegistry, ToolResult};

const ROUTER_PROMPT: &str = "You are a function router. Determine which function to call.

Available functions:
{functions}

{format_instructions}

User request: {user_input}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FunctionCall {
    /// Name of the function to call
    pub function_name: String,
    /// Arguments for the function
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Parsed intent plus the dispatched result, if the function exists
#[derive(Debug, Clone, Serialize)]
pub struct IntentOutcome {
    pub call: FunctionCall,
    pub output: Option<ToolResult>,
}

pub struct IntentParser {
    model: SharedChatModel,
    functions: ToolRegistry,
    prompt: ChatPromptTemplate,
    parser: JsonOutputParser<FunctionCall>,
    options: Option<ChatOptions>,
}

impl IntentParser {
    pub fn new(model: SharedChatModel, functions: ToolRegistry) -> Result<Self> {
        Ok(Self {
            model,
            functions,
            prompt: ChatPromptTemplate::from_template(ROUTER_PROMPT)?,
            parser: JsonOutputParser::new(),
            options: None,
        })
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Ask the model which function fits `user_input`
    pub async fn parse(&self, user_input: &str) -> Result<FunctionCall> {
        let messages = self.prompt.format_messages(&vars([
            ("functions", self.functions.describe()),
            ("format_instructions", self.parser.format_instructions()),
            ("user_input", user_input.to_string()),
        ]))?;
        let response = self
            .model
            .chat(&messages, self.options.as_ref())
            .await
            .map_err(Error::Model)?;
        let call = self.parser.parse(response.content())?;
        debug!(function = %call.function_name, "Parsed intent");
        Ok(call)
    }

    /// Run `call` when the registry knows its name; unknown names yield `None`
    pub async fn dispatch(&self, call: &FunctionCall) -> Result<Option<ToolResult>> {
        if !self.functions.contains(&call.function_name) {
            info!(function = %call.function_name, "Model chose an unknown function");
            return Ok(None);
        }
        let args = Value::Object(call.arguments.clone());
        self.functions
            .invoke(&call.function_name, &args)
            .await
            .map(Some)
    }

    pub async fn handle(&self, user_input: &str) -> Result<IntentOutcome> {
        let call = self.parse(user_input).await?;
        let output = self.dispatch(&call).await?;
        Ok(IntentOutcome { call, output })
    }
}
