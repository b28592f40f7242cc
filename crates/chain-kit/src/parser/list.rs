use async_trait::async_trait;
use llm_core::ChatResponse;

use super::OutputParser;
use crate::error::Result;
use crate::runnable::Runnable;

const INSTRUCTIONS: &str =
    "Your response should be a list of comma separated values, eg: `foo, bar, baz` or `foo,bar,baz`";

/// Splits a comma separated answer into items
///
/// Double-quoted items may contain commas. Items are trimmed and empty ones dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommaSeparatedListParser;

impl OutputParser for CommaSeparatedListParser {
    type Output = Vec<String>;

    fn parse(&self, text: &str) -> Result<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.trim().as_bytes());

        let mut items = Vec::new();
        for record in reader.records() {
            match record {
                Ok(record) => items.extend(
                    record
                        .iter()
                        .map(|field| field.trim_matches('"').trim())
                        .filter(|field| !field.is_empty())
                        .map(str::to_string),
                ),
                // Malformed quoting: fall back to a plain split
                Err(_) => {
                    return Ok(text
                        .split(',')
                        .map(|s| s.trim().trim_matches('"').trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect())
                }
            }
        }
        Ok(items)
    }

    fn format_instructions(&self) -> String {
        INSTRUCTIONS.to_string()
    }
}

#[async_trait]
impl Runnable for CommaSeparatedListParser {
    type Input = ChatResponse;
    type Output = Vec<String>;

    async fn invoke(&self, input: ChatResponse) -> Result<Vec<String>> {
        self.parse(input.content())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_spaces() {
        let parser = CommaSeparatedListParser;
        assert_eq!(
            parser.parse("Python, JavaScript, Java, C++, Go").unwrap(),
            vec!["Python", "JavaScript", "Java", "C++", "Go"]
        );
        assert_eq!(parser.parse("a,b,c").unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_quoted_items_keep_commas() {
        let parser = CommaSeparatedListParser;
        assert_eq!(
            parser.parse(r#""Hello, world",plain, "quoted""#).unwrap(),
            vec!["Hello, world", "plain", "quoted"]
        );
    }

    #[test]
    fn test_empty_items_dropped() {
        let parser = CommaSeparatedListParser;
        assert_eq!(parser.parse("a, , b,").unwrap(), vec!["a", "b"]);
        assert!(parser.parse("   ").unwrap().is_empty());
    }

    #[test]
    fn test_multiline_output_is_flattened() {
        let parser = CommaSeparatedListParser;
        assert_eq!(parser.parse("a, b\nc, d").unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_instructions_text() {
        assert_eq!(
            CommaSeparatedListParser.format_instructions(),
            "Your response should be a list of comma separated values, eg: `foo, bar, baz` or `foo,bar,baz`"
        );
    }
}
