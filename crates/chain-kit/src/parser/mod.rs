//! Output parsers turn model text into typed values
//!
//! Each parser also supplies the format instructions that are spliced into
//! the prompt so the model knows what shape to answer in.

mod json;
mod list;

use async_trait::async_trait;
use llm_core::ChatResponse;

use crate::error::Result;
use crate::runnable::Runnable;

pub use json::{extract_balanced_json, extract_fenced_block, JsonOutputParser, TypedOutputParser};
pub use list::CommaSeparatedListParser;

pub trait OutputParser: Send + Sync {
    type Output;

    fn parse(&self, text: &str) -> Result<Self::Output>;

    /// Text to include in the prompt; empty when the parser needs none
    fn format_instructions(&self) -> String {
        String::new()
    }
}

/// Returns the model's text unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct StrOutputParser;

impl OutputParser for StrOutputParser {
    type Output = String;

    fn parse(&self, text: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

#[async_trait]
impl Runnable for StrOutputParser {
    type Input = ChatResponse;
    type Output = String;

    async fn invoke(&self, input: ChatResponse) -> Result<String> {
        Ok(input.message.content)
    }
}
