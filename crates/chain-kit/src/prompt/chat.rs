//! Role-tagged templates that format into chat messages

use async_trait::async_trait;
use llm_core::{ChatMessage, Role};

use super::{PromptTemplate, Vars};
use crate::error::Result;
use crate::runnable::Runnable;

/// One message of a chat prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    role: Role,
    prompt: PromptTemplate,
}

impl MessageTemplate {
    pub fn new(role: Role, template: impl Into<String>) -> Result<Self> {
        Ok(Self {
            role,
            prompt: PromptTemplate::from_template(template)?,
        })
    }

    pub fn system(template: impl Into<String>) -> Result<Self> {
        Self::new(Role::System, template)
    }

    pub fn human(template: impl Into<String>) -> Result<Self> {
        Self::new(Role::User, template)
    }

    pub fn ai(template: impl Into<String>) -> Result<Self> {
        Self::new(Role::Assistant, template)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn format(&self, vars: &Vars) -> Result<ChatMessage> {
        Ok(ChatMessage::new(self.role, self.prompt.format(vars)?))
    }
}

/// Ordered list of message templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPromptTemplate {
    messages: Vec<MessageTemplate>,
}

impl ChatPromptTemplate {
    /// A prompt made of a single human message
    pub fn from_template(template: impl Into<String>) -> Result<Self> {
        Ok(Self {
            messages: vec![MessageTemplate::human(template)?],
        })
    }

    pub fn from_messages(messages: Vec<MessageTemplate>) -> Self {
        Self { messages }
    }

    /// Variables used by any message, sorted
    pub fn input_variables(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .messages
            .iter()
            .flat_map(|m| m.prompt.input_variables().iter().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn format_messages(&self, vars: &Vars) -> Result<Vec<ChatMessage>> {
        self.messages.iter().map(|m| m.format(vars)).collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[async_trait]
impl Runnable for ChatPromptTemplate {
    type Input = Vars;
    type Output = Vec<ChatMessage>;

    async fn invoke(&self, input: Vars) -> Result<Vec<ChatMessage>> {
        self.format_messages(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::prompt::vars;

    #[test]
    fn test_from_template_is_one_human_message() {
        let prompt = ChatPromptTemplate::from_template("Translate into {style}: {text}").unwrap();
        let messages = prompt
            .format_messages(&vars([("style", "slang"), ("text", "Hello how art thou?")]))
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "Translate into slang: Hello how art thou?");
    }

    #[test]
    fn test_from_messages_preserves_order_and_roles() {
        let prompt = ChatPromptTemplate::from_messages(vec![
            MessageTemplate::system("You are a {role} with expertise in {domain}.").unwrap(),
            MessageTemplate::human("Context: {context}").unwrap(),
            MessageTemplate::human("Question: {question}").unwrap(),
        ]);

        let messages = prompt
            .format_messages(&vars([
                ("role", "financial advisor"),
                ("domain", "retirement planning"),
                ("context", "35 years old"),
                ("question", "What first?"),
            ]))
            .unwrap();

        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::User]);
        assert_eq!(
            messages[0].content,
            "You are a financial advisor with expertise in retirement planning."
        );
        assert_eq!(messages[2].content, "Question: What first?");
        assert_eq!(
            prompt.input_variables(),
            vec!["context", "domain", "question", "role"]
        );
    }

    #[test]
    fn test_missing_variable_in_any_message_fails() {
        let prompt = ChatPromptTemplate::from_messages(vec![
            MessageTemplate::system("You are {role}.").unwrap(),
            MessageTemplate::human("{user_input}").unwrap(),
        ]);
        let err = prompt.format_messages(&vars([("role", "x")])).unwrap_err();
        assert!(matches!(err, Error::MissingVariable(name) if name == "user_input"));
    }
}
