//! Stateful workflow graph with SQLite step persistence
//!
//! A [`Workflow`] is a set of named async nodes joined by static or
//! conditional edges. Each node mutates the shared state and returns a JSON
//! record of what it did; [`StepStore`] keeps those records per run.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use llm_core::{ChatMessage, SharedChatModel};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::prompt::{vars, ChatPromptTemplate};
use crate::store::blocking;

/// Terminal node name
pub const END: &str = "__end__";

pub const DEFAULT_MAX_STEPS: usize = 25;

#[async_trait]
pub trait Node<S>: Send + Sync {
    /// Update `state`; the returned value is persisted as the step record
    async fn run(&self, state: &mut S) -> Result<Value>;
}

type EdgeFn<S> = Box<dyn Fn(&S) -> String + Send + Sync>;

enum Edge<S> {
    Static(String),
    Conditional(EdgeFn<S>),
}

/// Outcome of one run
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRun<S> {
    pub workflow_id: String,
    pub state: S,
    /// Node names in execution order
    pub visited: Vec<String>,
}

pub struct Workflow<S> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, Edge<S>>,
    entry: Option<String>,
    max_steps: usize,
}

impl<S: Send + 'static> Workflow<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn add_node<N: Node<S> + 'static>(mut self, name: impl Into<String>, node: N) -> Self {
        self.nodes.insert(name.into(), Arc::new(node));
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.insert(from.into(), Edge::Static(to.into()));
        self
    }

    /// Choose the next node from the state after `from` runs
    pub fn add_conditional_edge<F>(mut self, from: impl Into<String>, router: F) -> Self
    where
        F: Fn(&S) -> String + Send + Sync + 'static,
    {
        self.edges
            .insert(from.into(), Edge::Conditional(Box::new(router)));
        self
    }

    pub fn set_entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Node after `current`; nodes without an outgoing edge end the run
    fn next(&self, current: &str, state: &S) -> String {
        match self.edges.get(current) {
            Some(Edge::Static(to)) => to.clone(),
            Some(Edge::Conditional(router)) => router(state),
            None => END.to_string(),
        }
    }

    /// Execute from the entry node until `END`
    #[instrument(skip_all)]
    pub async fn run(&self, store: &StepStore, mut state: S) -> Result<WorkflowRun<S>> {
        let entry = self
            .entry
            .clone()
            .ok_or_else(|| Error::Workflow("no entry node set".to_string()))?;
        let workflow_id = new_workflow_id();
        info!(%workflow_id, %entry, "Starting workflow");

        let mut visited = Vec::new();
        let mut current = entry;
        while current != END {
            if visited.len() >= self.max_steps {
                return Err(Error::Workflow(format!(
                    "exceeded {} steps without reaching the end",
                    self.max_steps
                )));
            }
            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| Error::Workflow(format!("unknown node: {current}")))?;

            let data = node.run(&mut state).await?;
            store.record(&workflow_id, &current, data).await?;
            debug!(%workflow_id, step = %current, "Step completed");

            let next = self.next(&current, &state);
            visited.push(std::mem::replace(&mut current, next));
        }

        info!(%workflow_id, steps = visited.len(), "Workflow completed");
        Ok(WorkflowRun {
            workflow_id,
            state,
            visited,
        })
    }
}

impl<S: Send + 'static> Default for Workflow<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// First 8 hex digits of a random UUID
fn new_workflow_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredStep {
    pub id: i64,
    pub step_name: String,
    pub step_data: Value,
    pub created_at: String,
}

/// Persists workflow step records
#[derive(Clone)]
pub struct StepStore {
    conn: Arc<Mutex<Connection>>,
}

impl StepStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS workflow_steps (
                id INTEGER PRIMARY KEY,
                workflow_id TEXT,
                step_name TEXT,
                step_data TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn save_step(&self, workflow_id: &str, step_name: &str, data: &Value) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO workflow_steps (workflow_id, step_name, step_data) VALUES (?1, ?2, ?3)",
            params![workflow_id, step_name, data.to_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// `save_step` on the blocking pool
    pub async fn record(&self, workflow_id: &str, step_name: &str, data: Value) -> Result<i64> {
        let store = self.clone();
        let (workflow_id, step_name) = (workflow_id.to_string(), step_name.to_string());
        blocking(move || store.save_step(&workflow_id, &step_name, &data)).await
    }

    /// `steps` on the blocking pool
    pub async fn fetch(&self, workflow_id: &str) -> Result<Vec<StoredStep>> {
        let store = self.clone();
        let workflow_id = workflow_id.to_string();
        blocking(move || store.steps(&workflow_id)).await
    }

    /// Steps of one run in the order they were saved
    pub fn steps(&self, workflow_id: &str) -> Result<Vec<StoredStep>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, step_name, step_data, created_at FROM workflow_steps
             WHERE workflow_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![workflow_id], |row| {
            let raw: String = row.get(2)?;
            Ok(StoredStep {
                id: row.get(0)?,
                step_name: row.get(1)?,
                step_data: serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
                created_at: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl std::fmt::Debug for StepStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepStore").finish_non_exhaustive()
    }
}

// Customer-message support flow

const CLASSIFY_PROMPT: &str = "Classify this customer message into one category: 'support', 'sales', or 'general'.
Return only the category word.

Message: {text}";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SupportState {
    pub input: String,
    pub classification: Option<String>,
    pub response: Option<String>,
}

impl SupportState {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }
}

async fn complete(model: &SharedChatModel, messages: &[ChatMessage]) -> Result<String> {
    let response = model.chat(messages, None).await.map_err(Error::Model)?;
    Ok(response.message.content)
}

struct ClassifyNode {
    model: SharedChatModel,
    prompt: ChatPromptTemplate,
}

#[async_trait]
impl Node<SupportState> for ClassifyNode {
    async fn run(&self, state: &mut SupportState) -> Result<Value> {
        let messages = self
            .prompt
            .format_messages(&vars([("text", state.input.as_str())]))?;
        let category = complete(&self.model, &messages).await?.trim().to_lowercase();
        state.classification = Some(category.clone());
        Ok(json!({"input": state.input, "output": category}))
    }
}

struct RespondNode {
    model: SharedChatModel,
    prompts: BTreeMap<&'static str, ChatPromptTemplate>,
}

#[async_trait]
impl Node<SupportState> for RespondNode {
    async fn run(&self, state: &mut SupportState) -> Result<Value> {
        let category = state.classification.clone().unwrap_or_default();
        let prompt = self
            .prompts
            .get(category.as_str())
            .or_else(|| self.prompts.get("general"))
            .ok_or_else(|| Error::Workflow("no general response prompt".to_string()))?;

        let messages = prompt.format_messages(&vars([("text", state.input.as_str())]))?;
        let response = complete(&self.model, &messages).await?;
        state.response = Some(response.clone());
        Ok(json!({"classification": category, "response": response}))
    }
}

/// classify → respond → END
pub fn support_flow(model: SharedChatModel) -> Result<Workflow<SupportState>> {
    let mut prompts = BTreeMap::new();
    for (category, template) in [
        (
            "support",
            "You are a support agent. Address this concern helpfully: {text}",
        ),
        ("sales", "You are a sales rep. Respond to this inquiry: {text}"),
        ("general", "You are a helpful assistant. Respond to: {text}"),
    ] {
        prompts.insert(category, ChatPromptTemplate::from_template(template)?);
    }

    Ok(Workflow::new()
        .add_node(
            "classify",
            ClassifyNode {
                model: model.clone(),
                prompt: ChatPromptTemplate::from_template(CLASSIFY_PROMPT)?,
            },
        )
        .add_node("respond", RespondNode { model, prompts })
        .set_entry("classify")
        .add_edge("classify", "respond")
        .add_edge("respond", END))
}
