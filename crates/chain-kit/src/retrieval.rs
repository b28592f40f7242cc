//! In-memory document store with keyword and embedding search, and the RAG chain

use std::collections::{BTreeMap, HashMap};

use llm_core::{ChatOptions, SharedChatModel, SharedEmbedder};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::prompt::{vars, ChatPromptTemplate};

const RAG_PROMPT: &str = "Use the following context to answer the question.

Context:
{context}

Question: {question}

Answer:";

pub type Embedding = Vec<f32>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// `metadata["source"]`, falling back to the id
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .map(String::as_str)
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    #[serde(flatten)]
    pub document: Document,
    pub score: f32,
}

/// Compute cosine similarity between two embeddings
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

/// Lowercased query words with surrounding punctuation removed
fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

/// Sort by score descending (stable, so ties keep insertion order) and truncate
fn rank(mut scored: Vec<ScoredDocument>, top_k: usize) -> Vec<ScoredDocument> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);
    scored
}

#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: Vec<Document>,
    /// Embeddings by document id, filled on first semantic search
    embeddings: RwLock<HashMap<String, Embedding>>,
}

impl DocumentStore {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            embeddings: RwLock::new(HashMap::new()),
        }
    }

    pub fn add(&mut self, document: Document) {
        self.embeddings.write().remove(&document.id);
        self.documents.push(document);
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn cached_embeddings(&self) -> usize {
        self.embeddings.read().len()
    }

    /// Score = number of query words contained in the document text
    pub fn keyword_search(&self, query: &str, top_k: usize) -> Vec<ScoredDocument> {
        let terms = query_terms(query);
        let scored = self
            .documents
            .iter()
            .filter_map(|doc| {
                let content = doc.content.to_lowercase();
                let hits = terms.iter().filter(|t| content.contains(t.as_str())).count();
                (hits > 0).then(|| ScoredDocument {
                    document: doc.clone(),
                    score: hits as f32,
                })
            })
            .collect();
        rank(scored, top_k)
    }

    async fn ensure_embeddings(&self, embedder: &SharedEmbedder) -> Result<()> {
        let missing: Vec<&Document> = {
            let cache = self.embeddings.read();
            self.documents
                .iter()
                .filter(|d| !cache.contains_key(&d.id))
                .collect()
        };
        if missing.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = missing.iter().map(|d| d.content.clone()).collect();
        let vectors = embedder.embed(&texts).await.map_err(Error::Model)?;
        if vectors.len() != texts.len() {
            return Err(Error::Model(anyhow::anyhow!(
                "embedder returned {} vectors for {} documents",
                vectors.len(),
                texts.len()
            )));
        }

        let mut cache = self.embeddings.write();
        for (doc, vector) in missing.into_iter().zip(vectors) {
            cache.insert(doc.id.clone(), vector);
        }
        debug!(entries = cache.len(), "Cached document embeddings");
        Ok(())
    }

    /// Rank every document by cosine similarity to the query embedding
    pub async fn semantic_search(
        &self,
        embedder: &SharedEmbedder,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        self.ensure_embeddings(embedder).await?;
        let query_vector = embedder
            .embed(&[query.to_string()])
            .await
            .map_err(Error::Model)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Model(anyhow::anyhow!("embedder returned no vector for the query")))?;

        let cache = self.embeddings.read();
        let scored = self
            .documents
            .iter()
            .map(|doc| ScoredDocument {
                document: doc.clone(),
                score: cache
                    .get(&doc.id)
                    .map(|v| cosine_similarity(&query_vector, v))
                    .unwrap_or(0.0),
            })
            .collect();
        Ok(rank(scored, top_k))
    }
}

/// `[source]: content` blocks separated by blank lines
pub fn format_context(docs: &[ScoredDocument]) -> String {
    docs.iter()
        .map(|d| format!("[{}]: {}", d.document.source(), d.document.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Answer `question` from the retrieved documents
pub async fn rag_answer(
    model: &SharedChatModel,
    question: &str,
    docs: &[ScoredDocument],
    options: Option<&ChatOptions>,
) -> Result<String> {
    let prompt = ChatPromptTemplate::from_template(RAG_PROMPT)?;
    let messages = prompt.format_messages(&vars([
        ("context", format_context(docs)),
        ("question", question.to_string()),
    ]))?;
    let response = model.chat(&messages, options).await.map_err(Error::Model)?;
    Ok(response.message.content)
}

/// The three-document sample corpus
pub fn sample_documents() -> Vec<Document> {
    vec![
        Document::new(
            "doc1",
            "Python is a high-level programming language created by Guido van Rossum in 1991.",
        )
        .with_metadata("source", "programming_guide.txt"),
        Document::new(
            "doc2",
            "FastAPI is a modern web framework for building APIs with Python, known for high performance.",
        )
        .with_metadata("source", "web_frameworks.txt"),
        Document::new(
            "doc3",
            "Vector databases store data as high-dimensional vectors for semantic search.",
        )
        .with_metadata("source", "databases.txt"),
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use llm_core::testing::{KeywordEmbedder, ScriptedChatModel};

    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_keyword_search_sample_query() {
        let store = DocumentStore::new(sample_documents());
        let hits = store.keyword_search("What is Python?", 2);

        let ids: Vec<&str> = hits.iter().map(|h| h.document.id.as_str()).collect();
        assert_eq!(ids, vec!["doc1", "doc2"]);
        assert_eq!(hits[0].score, 2.0);
    }

    #[test]
    fn test_keyword_search_drops_zero_scores_and_ranks() {
        let store = DocumentStore::new(sample_documents());
        let hits = store.keyword_search("semantic vectors", 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.id, "doc3");

        let hits = store.keyword_search("FastAPI python", 5);
        assert_eq!(hits[0].document.id, "doc2");
        assert_eq!(hits[0].score, 2.0);
        assert_eq!(hits[1].document.id, "doc1");

        assert!(store.keyword_search("?!", 3).is_empty());
    }

    #[test]
    fn test_format_context() {
        let store = DocumentStore::new(sample_documents());
        let hits = store.keyword_search("What is Python?", 2);
        assert_eq!(
            format_context(&hits),
            "[programming_guide.txt]: Python is a high-level programming language created by Guido van Rossum in 1991.\n\n\
             [web_frameworks.txt]: FastAPI is a modern web framework for building APIs with Python, known for high performance."
        );
        assert_eq!(format_context(&[]), "");
    }

    #[tokio::test]
    async fn test_semantic_search_caches_embeddings() {
        let store = DocumentStore::new(sample_documents());
        let embedder: SharedEmbedder =
            Arc::new(KeywordEmbedder::new(["python", "vector", "semantic", "web"]));

        let hits = store
            .semantic_search(&embedder, "semantic vector search", 1)
            .await
            .unwrap();
        assert_eq!(hits[0].document.id, "doc3");
        assert_eq!(store.cached_embeddings(), 3);

        let hits = store.semantic_search(&embedder, "python web", 3).await.unwrap();
        assert_eq!(hits[0].document.id, "doc2");
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_rag_answer_prompt() {
        let model = Arc::new(ScriptedChatModel::with_replies(["Python is a language."]));
        let shared: SharedChatModel = model.clone();
        let store = DocumentStore::new(sample_documents());
        let docs = store.keyword_search("What is Python?", 2);

        let answer = rag_answer(&shared, "What is Python?", &docs, None).await.unwrap();
        assert_eq!(answer, "Python is a language.");

        let prompt = &model.calls()[0].messages[0].content;
        assert!(prompt.starts_with("Use the following context to answer the question.\n\nContext:\n[programming_guide.txt]"));
        assert!(prompt.ends_with("Question: What is Python?\n\nAnswer:"));
    }
}
