//! String templates with `{name}` placeholders

use std::collections::BTreeSet;

use async_trait::async_trait;
use llm_core::ChatMessage;

use super::Vars;
use crate::error::{Error, Result};
use crate::runnable::Runnable;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed string template
///
/// `{name}` is replaced on format; `{{` and `}}` produce literal braces.
/// Substituted values are never re-scanned, so a value may itself contain
/// braces (JSON schemas, code) without being mistaken for placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
    input_variables: Vec<String>,
}

impl PromptTemplate {
    pub fn from_template(template: impl Into<String>) -> Result<Self> {
        let source = template.into();
        let segments = parse_segments(&source)?;
        let input_variables = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Variable(name) => Some(name.clone()),
                Segment::Literal(_) => None,
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Ok(Self {
            source,
            segments,
            input_variables,
        })
    }

    /// Variable names in sorted order, without duplicates
    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    pub fn template(&self) -> &str {
        &self.source
    }

    /// Substitute every placeholder; variables not used by the template are ignored
    pub fn format(&self, vars: &Vars) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => {
                    let value = vars
                        .get(name)
                        .ok_or_else(|| Error::MissingVariable(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

fn parse_segments(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                literal.push('{');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    match c {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => {
                            return Err(Error::Template(format!(
                                "nested '{{' in placeholder starting at byte {pos}"
                            )))
                        }
                        _ => name.push(c),
                    }
                }
                if !closed {
                    return Err(Error::Template(format!(
                        "unclosed placeholder starting at byte {pos}"
                    )));
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(Error::Template(format!("empty placeholder at byte {pos}")));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Variable(name.to_string()));
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                literal.push('}');
            }
            '}' => {
                return Err(Error::Template(format!(
                    "single '}}' at byte {pos}; use '}}}}' for a literal brace"
                )))
            }
            _ => literal.push(c),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// A string prompt sent to a chat model becomes one human message
#[async_trait]
impl Runnable for PromptTemplate {
    type Input = Vars;
    type Output = Vec<ChatMessage>;

    async fn invoke(&self, input: Vars) -> Result<Vec<ChatMessage>> {
        Ok(vec![ChatMessage::user(self.format(&input)?)])
    }
}
