//! SQLite-backed conversation memory

use std::path::Path;
use std::sync::Arc;

use llm_core::{ChatOptions, SharedChatModel};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::prompt::{vars, ChatPromptTemplate};
use crate::store::blocking;

pub const HUMAN: &str = "human";
pub const AI: &str = "ai";

const MEMORY_PROMPT: &str = "Previous conversation:
{history}

Based on the conversation above, answer:
Human: {question}
Assistant:";

const SAMPLE_TURNS: [(&str, &str); 4] = [
    (HUMAN, "What is Python?"),
    (
        AI,
        "Python is a high-level programming language known for its simple syntax.",
    ),
    (HUMAN, "What are its main uses?"),
    (
        AI,
        "Python is used for web development, data science, and automation.",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredMessage {
    pub id: i64,
    pub role: String,
    pub content: String,
}

/// `Human: …` for human turns, `Assistant: …` for everything else
pub fn format_history(history: &[StoredMessage]) -> String {
    history
        .iter()
        .map(|m| {
            let prefix = if m.role == HUMAN { "Human" } else { "Assistant" };
            format!("{prefix}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reply to a question asked with the stored history as context
#[derive(Debug, Clone, Serialize)]
pub struct MemoryReply {
    pub history_used: usize,
    pub response: String,
}

#[derive(Clone)]
pub struct ConversationMemory {
    conn: Arc<Mutex<Connection>>,
    /// Held from reading the history until the new turns are stored
    turn: Arc<tokio::sync::Mutex<()>>,
}

impl ConversationMemory {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        debug!(path = %path.display(), "Opened conversation store");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY,
                role TEXT NOT NULL,
                content TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            turn: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Insert the four sample turns when the table is empty
    ///
    /// Returns whether anything was inserted.
    pub fn seed_if_empty(&self) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let count: i64 = tx.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(false);
        }
        for (role, content) in SAMPLE_TURNS {
            tx.execute(
                "INSERT INTO messages (role, content) VALUES (?1, ?2)",
                params![role, content],
            )?;
        }
        tx.commit()?;
        info!(turns = SAMPLE_TURNS.len(), "Seeded conversation history");
        Ok(true)
    }

    /// All messages, oldest first
    pub fn history(&self) -> Result<Vec<StoredMessage>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, role, content FROM messages ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredMessage {
                id: row.get(0)?,
                role: row.get(1)?,
                content: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The last `k` messages, oldest first
    pub fn window(&self, k: usize) -> Result<Vec<StoredMessage>> {
        let mut history = self.history()?;
        let skip = history.len().saturating_sub(k);
        Ok(history.split_off(skip))
    }

    pub fn append(&self, role: &str, content: &str) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO messages (role, content) VALUES (?1, ?2)",
            params![role, content],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Store a question and its answer together, or neither
    pub fn append_exchange(&self, question: &str, answer: &str) -> Result<(i64, i64)> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut ids = [0; 2];
        for (slot, (role, content)) in ids.iter_mut().zip([(HUMAN, question), (AI, answer)]) {
            tx.execute(
                "INSERT INTO messages (role, content) VALUES (?1, ?2)",
                params![role, content],
            )?;
            *slot = tx.last_insert_rowid();
        }
        tx.commit()?;
        Ok((ids[0], ids[1]))
    }

    /// `window(last)` or the whole history, read on the blocking pool
    pub async fn recent(&self, last: Option<usize>) -> Result<Vec<StoredMessage>> {
        let memory = self.clone();
        blocking(move || match last {
            Some(k) => memory.window(k),
            None => memory.history(),
        })
        .await
    }

    /// `clear` on the blocking pool, waiting for any turn in progress
    pub async fn reset(&self) -> Result<usize> {
        let _turn = self.turn.lock().await;
        let memory = self.clone();
        blocking(move || memory.clear()).await
    }

    /// Delete every message; returns how many were removed
    pub fn clear(&self) -> Result<usize> {
        let removed = self.conn.lock().execute("DELETE FROM messages", [])?;
        info!(removed, "Cleared conversation history");
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Answer `question` with the history as context, then store both turns
    ///
    /// Calls are serialized so each one sees the turns stored by the last.
    pub async fn continue_conversation(
        &self,
        model: &SharedChatModel,
        question: &str,
        options: Option<&ChatOptions>,
    ) -> Result<MemoryReply> {
        let _turn = self.turn.lock().await;
        let history = self.recent(None).await?;
        let prompt = ChatPromptTemplate::from_template(MEMORY_PROMPT)?;
        let messages = prompt.format_messages(&vars([
            ("history", format_history(&history)),
            ("question", question.to_string()),
        ]))?;

        let response = model
            .chat(&messages, options)
            .await
            .map_err(Error::Model)?
            .message
            .content;

        let memory = self.clone();
        let (asked, answered) = (question.to_string(), response.clone());
        blocking(move || memory.append_exchange(&asked, &answered)).await?;
        Ok(MemoryReply {
            history_used: history.len(),
            response,
        })
    }
}

impl std::fmt::Debug for ConversationMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationMemory").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use llm_core::testing::ScriptedChatModel;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_seed_only_once() {
        let memory = ConversationMemory::open_in_memory().unwrap();
        assert!(memory.is_empty().unwrap());

        assert!(memory.seed_if_empty().unwrap());
        assert!(!memory.seed_if_empty().unwrap());
        assert_eq!(memory.len().unwrap(), 4);
    }

    #[test]
    fn test_format_history() {
        let memory = ConversationMemory::open_in_memory().unwrap();
        memory.seed_if_empty().unwrap();
        assert_eq!(
            format_history(&memory.history().unwrap()),
            "Human: What is Python?\n\
             Assistant: Python is a high-level programming language known for its simple syntax.\n\
             Human: What are its main uses?\n\
             Assistant: Python is used for web development, data science, and automation."
        );
        assert_eq!(format_history(&[]), "");
    }

    #[test]
    fn test_append_window_and_clear() {
        let memory = ConversationMemory::open_in_memory().unwrap();
        memory.seed_if_empty().unwrap();
        let id = memory.append("system", "note").unwrap();
        assert_eq!(id, 5);

        let window = memory.window(2).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[1].content, "note");
        assert_eq!(format_history(&window[1..]), "Assistant: note");
        assert_eq!(memory.window(50).unwrap().len(), 5);

        assert_eq!(memory.clear().unwrap(), 5);
        assert!(memory.history().unwrap().is_empty());
    }

    #[test]
    fn test_history_persists_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conversations.db");
        {
            let memory = ConversationMemory::open(&path).unwrap();
            memory.seed_if_empty().unwrap();
        }
        let reopened = ConversationMemory::open(&path).unwrap();
        assert!(!reopened.seed_if_empty().unwrap());
        assert_eq!(reopened.len().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_continue_conversation_stores_turns() {
        let memory = ConversationMemory::open_in_memory().unwrap();
        memory.seed_if_empty().unwrap();
        let model = std::sync::Arc::new(ScriptedChatModel::with_replies(["Renaming files in bulk."]));
        let shared: SharedChatModel = model.clone();

        let reply = memory
            .continue_conversation(&shared, "Can you give me an example of Python automation?", None)
            .await
            .unwrap();
        assert_eq!(reply.history_used, 4);
        assert_eq!(reply.response, "Renaming files in bulk.");

        let prompt = &model.calls()[0].messages[0].content;
        assert!(prompt.starts_with("Previous conversation:\nHuman: What is Python?"));
        assert!(prompt.ends_with(
            "Based on the conversation above, answer:\nHuman: Can you give me an example of Python automation?\nAssistant:"
        ));

        let history = memory.history().unwrap();
        assert_eq!(history.len(), 6);
        assert_eq!(history[4].role, HUMAN);
        assert_eq!(history[5].content, "Renaming files in bulk.");
    }

    #[test]
    fn test_append_exchange_stores_pair() {
        let memory = ConversationMemory::open_in_memory().unwrap();
        memory.seed_if_empty().unwrap();
        assert_eq!(memory.append_exchange("Why?", "Because.").unwrap(), (5, 6));

        let window = memory.window(2).unwrap();
        assert_eq!(format_history(&window), "Human: Why?\nAssistant: Because.");
    }

    #[tokio::test]
    async fn test_concurrent_turns_see_each_other() {
        let memory = ConversationMemory::open_in_memory().unwrap();
        memory.seed_if_empty().unwrap();
        let model = std::sync::Arc::new(ScriptedChatModel::with_replies(["first answer", "second answer"]));
        let shared: SharedChatModel = model.clone();

        let (a, b) = tokio::join!(
            memory.continue_conversation(&shared, "First question?", None),
            memory.continue_conversation(&shared, "Second question?", None),
        );
        let mut used = [a.unwrap().history_used, b.unwrap().history_used];
        used.sort();
        assert_eq!(used, [4, 6]);

        let later = &model.calls()[1].messages[0].content;
        assert!(later.contains("Human: First question?\nAssistant: first answer"));

        let roles: Vec<_> = memory.history().unwrap().into_iter().map(|m| m.role).collect();
        assert_eq!(roles, [HUMAN, AI, HUMAN, AI, HUMAN, AI, HUMAN, AI]);
    }

    #[tokio::test]
    async fn test_recent_and_reset() {
        let memory = ConversationMemory::open_in_memory().unwrap();
        memory.seed_if_empty().unwrap();
        assert_eq!(memory.recent(None).await.unwrap().len(), 4);
        assert_eq!(memory.recent(Some(1)).await.unwrap()[0].role, AI);
        assert_eq!(memory.reset().await.unwrap(), 4);
        assert!(memory.recent(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_stores_nothing() {
        let memory = ConversationMemory::open_in_memory().unwrap();
        let shared: SharedChatModel = std::sync::Arc::new(ScriptedChatModel::new());
        let err = memory
            .continue_conversation(&shared, "hello?", None)
            .await
            .unwrap_err();
        assert!(err.is_model_failure());
        assert!(memory.is_empty().unwrap());
    }
}
