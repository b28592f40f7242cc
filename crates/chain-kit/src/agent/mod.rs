//! Tool-using agent
//!
//! Implements an observe-think-act loop: each round the model returns an
//! [`AgentThought`] as JSON, either naming a tool to run or giving the final
//! answer. Tool output is fed back through a scratchpad on the next round.

mod state;

use llm_core::{ChatOptions, SharedChatModel};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::parser::{JsonOutputParser, OutputParser};
use crate::prompt::{vars, ChatPromptTemplate};
use crate::tools::ToolRegistry;

pub use state::{AgentState, AgentStep, FailureTracker, DEFAULT_MAX_CONSECUTIVE_FAILURES};

pub const DEFAULT_MAX_ITERATIONS: usize = 5;

const AGENT_PROMPT: &str = "You are a helpful assistant with access to tools.

Available tools:
{tools}

Think step by step. If you need a tool, use it. If you can answer, provide final_answer.

{format_instructions}

Question: {question}{scratchpad}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AgentAction {
    UseTool,
    FinalAnswer,
}

/// The model's decision for one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgentThought {
    /// What the agent is thinking
    #[serde(default)]
    pub thought: String,
    /// 'use_tool' or 'final_answer'
    pub action: AgentAction,
    /// Tool to use
    #[serde(default)]
    pub tool_name: Option<String>,
    /// Tool arguments
    #[serde(default)]
    pub tool_input: Option<Value>,
    /// Final answer
    #[serde(default)]
    pub final_answer: Option<String>,
}

pub struct Agent {
    model: SharedChatModel,
    tools: ToolRegistry,
    prompt: ChatPromptTemplate,
    parser: JsonOutputParser<AgentThought>,
    options: Option<ChatOptions>,
    max_iterations: usize,
    max_consecutive_failures: usize,
}

impl Agent {
    pub fn new(model: SharedChatModel, tools: ToolRegistry) -> Result<Self> {
        Ok(Self {
            model,
            tools,
            prompt: ChatPromptTemplate::from_template(AGENT_PROMPT)?,
            parser: JsonOutputParser::new(),
            options: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        })
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: usize) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// One model round: decide the next action given prior observations
    pub async fn think(&self, question: &str, scratchpad: &str) -> Result<AgentThought> {
        let scratchpad = if scratchpad.is_empty() {
            String::new()
        } else {
            format!("\n\nPrevious steps:\n{scratchpad}")
        };
        let messages = self.prompt.format_messages(&vars([
            ("tools", self.tools.describe()),
            ("format_instructions", self.parser.format_instructions()),
            ("question", question.to_string()),
            ("scratchpad", scratchpad),
        ]))?;

        let response = self
            .model
            .chat(&messages, self.options.as_ref())
            .await
            .map_err(Error::Model)?;
        self.parser.parse(response.content())
    }

    /// Run the tool named in `thought`; failures become observations
    async fn act(&self, thought: &AgentThought) -> (String, std::result::Result<String, String>) {
        let Some(name) = thought.tool_name.as_deref() else {
            return (
                FailureTracker::tool_signature("", &Value::Null),
                Err("action was use_tool but no tool_name was given".to_string()),
            );
        };
        let args = thought.tool_input.clone().unwrap_or_else(|| json!({}));
        let signature = FailureTracker::tool_signature(name, &args);

        let outcome = match self.tools.invoke(name, &args).await {
            Ok(result) if result.success => Ok(result.output_text()),
            Ok(result) => Err(result.error.unwrap_or_else(|| "tool failed".to_string())),
            Err(e) => Err(e.to_string()),
        };
        (signature, outcome)
    }

    /// Loop until a final answer, an abort, or `max_iterations` rounds
    ///
    /// Model and parse failures end the run with an `Err`.
    #[instrument(skip(self), fields(model = self.model.model_name()))]
    pub async fn run(&self, question: &str) -> Result<AgentState> {
        info!(
            max_iterations = self.max_iterations,
            tools = self.tools.len(),
            "Starting agent loop"
        );
        let mut state = AgentState::with_max_consecutive_failures(self.max_consecutive_failures);

        while !state.finished && state.iteration < self.max_iterations {
            state.increment_iteration();
            let thought = self.think(question, &state.scratchpad()).await?;
            debug!(iteration = state.iteration, action = ?thought.action, "Agent decided");

            match thought.action {
                AgentAction::FinalAnswer => {
                    let answer = thought
                        .final_answer
                        .clone()
                        .unwrap_or_else(|| thought.thought.clone());
                    state.add_step(AgentStep {
                        thought,
                        observation: None,
                    });
                    info!(iterations = state.iteration, "Agent completed task");
                    state.mark_finished(answer);
                }
                AgentAction::UseTool => {
                    let (signature, outcome) = self.act(&thought).await;
                    let observation = match outcome {
                        Ok(output) => {
                            state.failure_tracker.record_success();
                            output
                        }
                        Err(error) => {
                            warn!(tool = ?thought.tool_name, %error, "Tool call failed");
                            if let Some(abort) =
                                state.failure_tracker.record_failure(&signature, &error)
                            {
                                state.add_step(AgentStep {
                                    thought,
                                    observation: Some(format!("Error: {error}")),
                                });
                                state.mark_error(abort);
                                break;
                            }
                            format!("Error: {error}")
                        }
                    };
                    state.add_step(AgentStep {
                        thought,
                        observation: Some(observation),
                    });
                }
            }
        }

        if !state.finished {
            warn!(iterations = state.iteration, "Agent stopped at max iterations");
        }
        Ok(state)
    }
}
