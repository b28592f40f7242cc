use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::future::try_join_all;

use super::Runnable;
use crate::error::Result;

type Branch<I, O> = Box<dyn Runnable<Input = I, Output = O>>;

/// Named branches run concurrently on clones of the same input
pub struct Parallel<I, O> {
    branches: Vec<(String, Branch<I, O>)>,
}

impl<I, O> Parallel<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            branches: Vec::new(),
        }
    }

    pub fn branch<R>(mut self, name: impl Into<String>, runnable: R) -> Self
    where
        R: Runnable<Input = I, Output = O> + 'static,
    {
        self.branches.push((name.into(), Box::new(runnable)));
        self
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

impl<I, O> Default for Parallel<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<I, O> Runnable for Parallel<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = BTreeMap<String, O>;

    async fn invoke(&self, input: I) -> Result<BTreeMap<String, O>> {
        let runs = self.branches.iter().map(|(name, branch)| {
            let input = input.clone();
            async move { branch.invoke(input).await.map(|out| (name.clone(), out)) }
        });
        Ok(try_join_all(runs).await?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use llm_core::testing::ScriptedChatModel;

    use super::*;
    use crate::error::Error;
    use crate::parser::StrOutputParser;
    use crate::prompt::{vars, ChatPromptTemplate, Vars};
    use crate::runnable::{Lambda, LlmStep, Passthrough};

    #[tokio::test]
    async fn test_branches_share_input() {
        let model = Arc::new(ScriptedChatModel::with_replies(["reply one", "reply two"]));
        let chain = |template: &str| {
            ChatPromptTemplate::from_template(template)
                .unwrap()
                .pipe(LlmStep::new(model.clone()))
                .pipe(StrOutputParser)
        };

        let parallel = Parallel::new()
            .branch("joke", chain("Tell a very short joke about {topic}"))
            .branch("fact", chain("Tell me one interesting fact about {topic}"));

        let out = parallel.invoke(vars([("topic", "cats")])).await.unwrap();

        assert_eq!(out.len(), 2);
        assert!(out.contains_key("joke") && out.contains_key("fact"));
        let prompts: Vec<String> = model
            .calls()
            .iter()
            .map(|c| c.messages[0].content.clone())
            .collect();
        assert!(prompts.contains(&"Tell a very short joke about cats".to_string()));
        assert!(prompts.contains(&"Tell me one interesting fact about cats".to_string()));
    }

    #[tokio::test]
    async fn test_passthrough_and_lambda_build_vars() {
        let mapping: Parallel<String, String> = Parallel::new()
            .branch("question", Passthrough::new())
            .branch(
                "context",
                Lambda::new(|_: String| Ok("Python was created by Guido van Rossum.".to_string())),
            );

        let out: Vars = mapping.invoke("Who created Python?".to_string()).await.unwrap();
        assert_eq!(out["question"], "Who created Python?");
        assert_eq!(out["context"], "Python was created by Guido van Rossum.");
    }

    #[tokio::test]
    async fn test_one_failing_branch_fails_all() {
        let parallel: Parallel<i32, i32> = Parallel::new()
            .branch("ok", Lambda::new(|x: i32| Ok(x)))
            .branch(
                "bad",
                Lambda::new(|_: i32| -> Result<i32> { Err(Error::Parse("bad".into())) }),
            );
        assert!(parallel.invoke(1).await.is_err());
    }
}
