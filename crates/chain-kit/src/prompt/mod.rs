//! Prompt templates
//!
//! Three flavours, all formatted from a [`Vars`] map:
//! - [`PromptTemplate`]: a single string
//! - [`ChatPromptTemplate`]: role-tagged messages composed from [`MessageTemplate`]s
//! - [`FewShotPromptTemplate`]: examples rendered between a prefix and a suffix

mod chat;
mod few_shot;
mod template;

use std::collections::BTreeMap;

pub use chat::{ChatPromptTemplate, MessageTemplate};
pub use few_shot::{FewShotPromptTemplate, DEFAULT_EXAMPLE_SEPARATOR};
pub use template::PromptTemplate;

/// Template variables, ordered by name
pub type Vars = BTreeMap<String, String>;

/// Build a [`Vars`] map from pairs
pub fn vars<I, K, V>(pairs: I) -> Vars
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
