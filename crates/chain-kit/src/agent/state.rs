//! Agent state management

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use super::AgentThought;

/// Default max consecutive failures before aborting
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: usize = 3;

/// One think/act round
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStep {
    pub thought: AgentThought,
    /// Tool output or failure message; absent for the final answer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
}

/// State of the agent during execution
#[derive(Debug, Serialize)]
pub struct AgentState {
    pub steps: Vec<AgentStep>,
    /// Current iteration
    pub iteration: usize,
    /// Whether the agent has finished
    pub finished: bool,
    pub final_answer: Option<String>,
    /// Error message (if aborted)
    pub error: Option<String>,
    /// Failure tracker for detecting loops on a broken call
    #[serde(skip)]
    pub failure_tracker: FailureTracker,
}

impl AgentState {
    pub fn new() -> Self {
        Self::with_max_consecutive_failures(DEFAULT_MAX_CONSECUTIVE_FAILURES)
    }

    /// Create with custom max consecutive failures
    pub fn with_max_consecutive_failures(max: usize) -> Self {
        Self {
            steps: Vec::new(),
            iteration: 0,
            finished: false,
            final_answer: None,
            error: None,
            failure_tracker: FailureTracker::new(max),
        }
    }

    pub fn add_step(&mut self, step: AgentStep) {
        self.steps.push(step);
    }

    pub fn mark_finished(&mut self, answer: String) {
        self.finished = true;
        self.final_answer = Some(answer);
    }

    pub fn mark_error(&mut self, error: String) {
        self.finished = true;
        self.error = Some(error);
    }

    pub fn increment_iteration(&mut self) {
        self.iteration += 1;
    }

    /// Previous rounds rendered for the next prompt
    pub fn scratchpad(&self) -> String {
        self.steps
            .iter()
            .filter_map(|step| {
                let observation = step.observation.as_ref()?;
                let tool = step.thought.tool_name.as_deref().unwrap_or("none");
                let input = step
                    .thought
                    .tool_input
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "{}".to_string());
                Some(format!(
                    "Thought: {}\nAction: {tool} {input}\nObservation: {observation}",
                    step.thought.thought
                ))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Default for AgentState {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks consecutive failures for tool calls to detect loops
#[derive(Debug, Default)]
pub struct FailureTracker {
    /// Map from tool call signature to consecutive failure count
    failures: HashMap<String, ConsecutiveFailure>,
    /// Maximum consecutive failures before aborting
    max_consecutive: usize,
}

#[derive(Debug, Clone)]
pub struct ConsecutiveFailure {
    pub count: usize,
    pub last_error: String,
}

impl FailureTracker {
    pub fn new(max_consecutive: usize) -> Self {
        Self {
            failures: HashMap::new(),
            max_consecutive,
        }
    }

    /// Create a signature for a tool call (name + arguments hash)
    pub fn tool_signature(name: &str, args: &serde_json::Value) -> String {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        args.to_string().hash(&mut hasher);
        format!("{}:{:x}", name, hasher.finish())
    }

    /// Record a successful tool execution; any success ends every failure streak
    pub fn record_success(&mut self) {
        self.failures.clear();
    }

    /// Record a failed tool execution
    ///
    /// Returns `Some(message)` once the same call has failed `max_consecutive` times.
    pub fn record_failure(&mut self, signature: &str, error: &str) -> Option<String> {
        let entry = self
            .failures
            .entry(signature.to_string())
            .or_insert(ConsecutiveFailure {
                count: 0,
                last_error: String::new(),
            });

        entry.count += 1;
        entry.last_error = error.to_string();

        (entry.count >= self.max_consecutive).then(|| {
            format!(
                "Tool call failed {} consecutive times with error: {}",
                entry.count, entry.last_error
            )
        })
    }

    pub fn failure_count(&self, signature: &str) -> usize {
        self.failures.get(signature).map_or(0, |f| f.count)
    }
}
