//! chain-kit: orchestration primitives for local chat models
//!
//! Provides:
//! - Prompt templates (string, chat, few-shot)
//! - Output parsers (string, comma list, JSON, validated JSON)
//! - Runnables that pipe prompts, models and parsers together
//! - Tools, function calling and a tool-using agent
//! - Routing, retrieval, SQLite conversation memory and workflow graphs

pub mod agent;
pub mod error;
pub mod functions;
pub mod memory;
pub mod parser;
pub mod prompt;
pub mod retrieval;
pub mod routing;
pub mod runnable;
mod store;
pub mod tools;
pub mod workflow;

pub use error::{Error, Result};
pub use prompt::{vars, Vars};
pub use runnable::Runnable;
