//! Few-shot prompts: worked examples rendered ahead of the real query

use async_trait::async_trait;
use llm_core::ChatMessage;

use super::{PromptTemplate, Vars};
use crate::error::Result;
use crate::runnable::Runnable;

pub const DEFAULT_EXAMPLE_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone)]
pub struct FewShotPromptTemplate {
    examples: Vec<Vars>,
    example_prompt: PromptTemplate,
    prefix: Option<PromptTemplate>,
    suffix: PromptTemplate,
    separator: String,
}

impl FewShotPromptTemplate {
    pub fn new(examples: Vec<Vars>, example_prompt: PromptTemplate, suffix: PromptTemplate) -> Self {
        Self {
            examples,
            example_prompt,
            prefix: None,
            suffix,
            separator: DEFAULT_EXAMPLE_SEPARATOR.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: PromptTemplate) -> Self {
        self.prefix = Some(prefix);
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Prefix, each rendered example, then the suffix, joined by the separator
    pub fn format(&self, vars: &Vars) -> Result<String> {
        let mut pieces = Vec::with_capacity(self.examples.len() + 2);
        if let Some(prefix) = &self.prefix {
            pieces.push(prefix.format(vars)?);
        }
        for example in &self.examples {
            pieces.push(self.example_prompt.format(example)?);
        }
        pieces.push(self.suffix.format(vars)?);
        Ok(pieces.join(&self.separator))
    }
}

#[async_trait]
impl Runnable for FewShotPromptTemplate {
    type Input = Vars;
    type Output = Vec<ChatMessage>;

    async fn invoke(&self, input: Vars) -> Result<Vec<ChatMessage>> {
        Ok(vec![ChatMessage::user(self.format(&input)?)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::vars;

    fn sentiment_prompt() -> FewShotPromptTemplate {
        FewShotPromptTemplate::new(
            vec![
                vars([("input", "Great day."), ("output", "Positive")]),
                vars([("input", "Awful day."), ("output", "Negative")]),
            ],
            PromptTemplate::from_template("Input: {input}\nSentiment: {output}").unwrap(),
            PromptTemplate::from_template("Input: {input}\nSentiment:").unwrap(),
        )
        .with_prefix(PromptTemplate::from_template("Classify the sentiment.").unwrap())
    }

    #[test]
    fn test_format_joins_with_blank_lines() {
        let text = sentiment_prompt()
            .format(&vars([("input", "Slow service.")]))
            .unwrap();
        assert_eq!(
            text,
            "Classify the sentiment.\n\n\
             Input: Great day.\nSentiment: Positive\n\n\
             Input: Awful day.\nSentiment: Negative\n\n\
             Input: Slow service.\nSentiment:"
        );
    }

    #[test]
    fn test_custom_separator_and_no_prefix() {
        let prompt = FewShotPromptTemplate::new(
            vec![vars([("q", "1+1"), ("a", "2")])],
            PromptTemplate::from_template("{q}={a}").unwrap(),
            PromptTemplate::from_template("{q}=").unwrap(),
        )
        .with_separator("\n");
        assert_eq!(prompt.format(&vars([("q", "2+2")])).unwrap(), "1+1=2\n2+2=");
    }

    #[test]
    fn test_example_missing_field_fails() {
        let prompt = FewShotPromptTemplate::new(
            vec![vars([("input", "only input")])],
            PromptTemplate::from_template("{input} -> {output}").unwrap(),
            PromptTemplate::from_template("{input} ->").unwrap(),
        );
        assert!(prompt.format(&vars([("input", "x")])).is_err());
    }
}
