//! JSON output parsing with schema-derived format instructions

use std::marker::PhantomData;

use async_trait::async_trait;
use llm_core::ChatResponse;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use validator::Validate;

use super::OutputParser;
use crate::error::{Error, Result};
use crate::runnable::Runnable;

const JSON_FORMAT_INSTRUCTIONS: &str = r#"The output should be formatted as a JSON instance that conforms to the JSON schema below.

As an example, for the schema {"properties": {"foo": {"title": "Foo", "description": "a list of strings", "type": "array", "items": {"type": "string"}}}, "required": ["foo"]}
the object {"foo": ["bar", "baz"]} is a well-formatted instance of the schema. The object {"properties": {"foo": ["bar", "baz"]}} is not well-formatted.

Here is the output schema:
```
{schema}
```"#;

/// Return the body of the first fenced code block, if any
pub fn extract_fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    // Skip the language tag on the opening line
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    let block = body[..close].trim();
    (!block.is_empty()).then_some(block)
}

/// Find the balanced `{...}` or `[...]` span starting at byte `start`
///
/// Brackets inside string literals are ignored.
fn balanced_span(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// First balanced JSON object or array embedded in prose
pub fn extract_balanced_json(text: &str) -> Option<&str> {
    candidates(text).next()
}

fn candidates(text: &str) -> impl Iterator<Item = &str> {
    text.char_indices()
        .filter(|(_, c)| matches!(c, '{' | '['))
        .filter_map(move |(i, _)| balanced_span(text, i))
}

/// Deserialize the first JSON value in `text` that fits `T`
///
/// Tries, in order: the whole text, the first fenced code block, then every
/// balanced object/array found in the text.
fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let trimmed = text.trim();
    let mut last_error = None;

    let attempts = std::iter::once(trimmed)
        .chain(extract_fenced_block(trimmed))
        .chain(candidates(trimmed));

    for candidate in attempts {
        match serde_json::from_str::<T>(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e),
        }
    }

    debug!(len = text.len(), "No JSON value in model output matched the target type");
    Err(Error::Parse(match last_error {
        Some(e) => format!("{e}; output was: {}", preview(trimmed)),
        None => "empty output".to_string(),
    }))
}

fn preview(text: &str) -> String {
    const MAX: usize = 200;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(MAX).collect::<String>())
    }
}

/// JSON schema of `T` with the noise keys removed
fn schema_json<T: JsonSchema>() -> String {
    let schema = schemars::schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or(Value::Null);
    if let Some(object) = value.as_object_mut() {
        for key in ["$schema", "title", "type"] {
            object.remove(key);
        }
    }
    value.to_string()
}

/// Parses model output as JSON into `T`
pub struct JsonOutputParser<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonOutputParser<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonOutputParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonOutputParser<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned + JsonSchema> OutputParser for JsonOutputParser<T> {
    type Output = T;

    fn parse(&self, text: &str) -> Result<T> {
        parse_json(text)
    }

    fn format_instructions(&self) -> String {
        JSON_FORMAT_INSTRUCTIONS.replace("{schema}", &schema_json::<T>())
    }
}

#[async_trait]
impl<T> Runnable for JsonOutputParser<T>
where
    T: DeserializeOwned + JsonSchema + Send + 'static,
{
    type Input = ChatResponse;
    type Output = T;

    async fn invoke(&self, input: ChatResponse) -> Result<T> {
        self.parse(input.content())
    }
}

/// JSON parser that also enforces `validator` constraints on the result
pub struct TypedOutputParser<T> {
    json: JsonOutputParser<T>,
}

impl<T> TypedOutputParser<T> {
    pub fn new() -> Self {
        Self {
            json: JsonOutputParser::new(),
        }
    }
}

impl<T> Default for TypedOutputParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned + JsonSchema + Validate> OutputParser for TypedOutputParser<T> {
    type Output = T;

    fn parse(&self, text: &str) -> Result<T> {
        let value = self.json.parse(text)?;
        value
            .validate()
            .map_err(|e| Error::Validation(e.to_string()))?;
        Ok(value)
    }

    fn format_instructions(&self) -> String {
        self.json.format_instructions()
    }
}

#[async_trait]
impl<T> Runnable for TypedOutputParser<T>
where
    T: DeserializeOwned + JsonSchema + Validate + Send + 'static,
{
    type Input = ChatResponse;
    type Output = T;

    async fn invoke(&self, input: ChatResponse) -> Result<T> {
        self.parse(input.content())
    }
}
