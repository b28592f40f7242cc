//! Error type shared by every chain-kit component

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing template variable: {0}")]
    MissingVariable(String),

    #[error("invalid template: {0}")]
    Template(String),

    /// The model runtime could not be reached or rejected the request
    #[error("{0:#}")]
    Model(#[source] anyhow::Error),

    #[error("could not parse model output: {0}")]
    Parse(String),

    #[error("model output failed validation: {0}")]
    Validation(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {message}")]
    ToolArguments { tool: String, message: String },

    #[error("tool {tool} failed: {message}")]
    Tool { tool: String, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("storage task failed: {0}")]
    StorageTask(#[from] tokio::task::JoinError),

    #[error("workflow error: {0}")]
    Workflow(String),
}

impl Error {
    pub fn tool_arguments(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolArguments {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Whether the failure came from the model runtime rather than its output
    pub fn is_model_failure(&self) -> bool {
        matches!(self, Error::Model(_))
    }
}
