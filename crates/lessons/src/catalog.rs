//! The lesson catalog: one row per lesson, each served at its own endpoint

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Lesson {
    pub file: &'static str,
    pub endpoint: &'static str,
    pub description: &'static str,
}

impl Lesson {
    /// Leading numeric segments of the file name, e.g. `05_1` for `05_1_multi_variable_prompts`
    pub fn prefix(&self) -> String {
        self.file
            .split('_')
            .take_while(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()))
            .collect::<Vec<_>>()
            .join("_")
    }
}

const fn lesson(file: &'static str, endpoint: &'static str, description: &'static str) -> Lesson {
    Lesson {
        file,
        endpoint,
        description,
    }
}

pub const LESSONS: &[Lesson] = &[
    lesson("01_basic_invocation", "/api/basic", "Send a single message and return the reply"),
    lesson("02_system_messages", "/api/basic2", "Shape the reply with a system persona"),
    lesson("03_usage_metadata", "/api/basic3", "Report input and output token counts"),
    lesson("04_prompt_templates", "/api/basic4", "Fill a style translation template before calling the model"),
    lesson("05_prompt_templates", "/api/prompt-templates/basic", "Single-string prompt template"),
    lesson("05_1_multi_variable_prompts", "/api/prompt-templates/multi-variable", "Template with many variables"),
    lesson("05_2_chat_prompt_templates", "/api/prompt-templates/chat", "System and human message templates"),
    lesson("05_3_few_shot_prompting", "/api/prompt-templates/few-shot", "Teach a task through worked examples"),
    lesson("05_4_prompt_composition", "/api/prompt-templates/composition", "Compose a prompt from several messages"),
    lesson("06_json_structured_output", "/api/parsers/json", "Extract review fields as JSON"),
    lesson("06_1_comma_separated_list", "/api/parsers/comma-list", "Parse a comma separated list"),
    lesson("06_2_pydantic_output", "/api/parsers/typed", "Parse and validate a typed record"),
    lesson("06_3_nested_json", "/api/parsers/nested-json", "Parse nested JSON objects"),
    lesson("06_4_json_with_lists", "/api/parsers/json-list", "Parse JSON containing arrays"),
    lesson("07_chains", "/api/chains/basic", "Pipe prompt, model and parser"),
    lesson("07_1_sequential_chains", "/api/chains/sequential", "Feed one chain's output into the next"),
    lesson("08_runnable", "/api/runnable/passthrough", "Pass input through next to computed context"),
    lesson("08_1_parallel_runnable", "/api/runnable/parallel", "Run chains concurrently on one input"),
    lesson("09_memory", "/api/memory/continue", "Continue a conversation stored in SQLite"),
    lesson("10_tools", "/api/tools/basic", "Define and run tools directly"),
    lesson("11_functions", "/api/functions/intent-parsing", "Let the model pick a function and its arguments"),
    lesson("12_agents", "/api/agents/react-simple", "Reason and act with tools until done"),
    lesson("13_routing", "/api/routing/classify", "Classify a question, then route it"),
    lesson("14_document_retrieval", "/api/retrieval/rag", "Answer from keyword-retrieved documents"),
    lesson("14_1_semantic_retrieval", "/api/retrieval/semantic", "Answer from embedding-retrieved documents"),
    lesson("15_langgraph", "/api/langgraph/basic-flow", "Stateful classify-and-respond workflow"),
];

pub fn find(endpoint: &str) -> Option<&'static Lesson> {
    LESSONS.iter().find(|l| l.endpoint == endpoint)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_prefixes_are_unique() {
        let mut seen = HashSet::new();
        for lesson in LESSONS {
            let prefix = lesson.prefix();
            assert!(!prefix.is_empty(), "{} has no numbering prefix", lesson.file);
            assert!(seen.insert(prefix.clone()), "duplicate prefix {prefix}");
        }
    }

    #[test]
    fn test_endpoints_are_unique() {
        let mut seen = HashSet::new();
        for lesson in LESSONS {
            assert!(lesson.endpoint.starts_with("/api/"));
            assert!(seen.insert(lesson.endpoint), "duplicate endpoint {}", lesson.endpoint);
        }
    }

    #[test]
    fn test_prefix_parsing() {
        assert_eq!(lesson("05_1_multi", "/x", "").prefix(), "05_1");
        assert_eq!(lesson("01_basic", "/x", "").prefix(), "01");
        assert_eq!(lesson("basic", "/x", "").prefix(), "");
    }

    #[test]
    fn test_find() {
        assert_eq!(find("/api/basic3").unwrap().file, "03_usage_metadata");
        assert!(find("/api/nope").is_none());
    }

    #[test]
    fn test_files_keep_lesson_names() {
        assert_eq!(find("/api/parsers/typed").unwrap().file, "06_2_pydantic_output");
        assert_eq!(find("/api/runnable/passthrough").unwrap().file, "08_runnable");
        assert_eq!(find("/api/langgraph/basic-flow").unwrap().file, "15_langgraph");
    }
}
