//! In-memory course index: used when no vector store is configured,
//! and in tests.
//!
//! Scores passages by lexical overlap with the query: the share of the
//! query's content words that appear in the passage. Crude next to an
//! embedding search, but deterministic and dependency-free.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use coursemate_core::error::RetrievalError;
use coursemate_core::retrieval::{PassageMetadata, QueryResult, VectorStore};
use tokio::sync::RwLock;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "can", "do", "does", "for", "how", "in", "is", "it", "of", "on",
    "or", "the", "to", "what", "when", "which", "who", "why", "with", "you",
];

/// A passage held by the in-memory index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPassage {
    pub content: String,
    pub metadata: PassageMetadata,
}

impl IndexedPassage {
    pub fn new(content: &str, source: &str, location: &str) -> Self {
        Self {
            content: content.into(),
            metadata: PassageMetadata {
                source: Some(source.into()),
                location: Some(location.into()),
                section_title: None,
            },
        }
    }
}

/// An in-memory store holding passages in a Vec.
pub struct InMemoryStore {
    entries: Arc<RwLock<Vec<IndexedPassage>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_passages(passages: Vec<IndexedPassage>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(passages)),
        }
    }

    /// A store preloaded with a few introductory course pages.
    pub fn course_index() -> Self {
        Self::with_passages(vec![
            IndexedPassage::new(
                "Large Language Models (LLMs) are AI systems trained on massive amounts of text data to generate human-like text.",
                "AI Foundations",
                "module1/llms.html",
            ),
            IndexedPassage::new(
                "Machine learning is a subset of artificial intelligence that uses statistical techniques to enable computer systems to learn from data.",
                "Machine Learning Basics",
                "module2/ml_basics.html",
            ),
            IndexedPassage::new(
                "The transformer architecture processes text in parallel and uses attention to learn relationships between words in a sequence.",
                "AI Technical Concepts",
                "module2/transformers.html",
            ),
            IndexedPassage::new(
                "Prompt engineering is the practice of writing clear instructions and examples so a language model produces useful output.",
                "Working with AI",
                "module3/prompting.html",
            ),
            IndexedPassage::new(
                "Temperature controls randomness when a model samples the next token: low values are focused, high values are more creative.",
                "Working with AI",
                "module3/temperature.html",
            ),
        ])
    }

    pub async fn insert(&self, passage: IndexedPassage) {
        self.entries.write().await.push(passage);
    }

    pub async fn count(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased content words with a trailing plural `s` dropped.
fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 1 && !STOPWORDS.contains(&w.as_str()))
        .map(|w| match w.strip_suffix('s') {
            Some(stem) if stem.len() > 2 => stem.to_string(),
            _ => w,
        })
        .collect()
}

/// Share of query terms present in the passage, in [0, 1].
fn overlap_score(query: &HashSet<String>, passage: &str) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let passage = terms(passage);
    let hits = query.iter().filter(|t| passage.contains(*t)).count();
    hits as f64 / query.len() as f64
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn query(&self, query_text: &str, top_k: usize) -> Result<QueryResult, RetrievalError> {
        let entries = self.entries.read().await;
        let query = terms(query_text);

        let mut scored: Vec<(f64, &IndexedPassage)> = entries
            .iter()
            .map(|e| (overlap_score(&query, &e.content), e))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        let mut result = QueryResult::default();
        for (score, entry) in scored {
            result.documents.push(entry.content.clone());
            result.metadatas.push(entry.metadata.clone());
            result.scores.push(score);
        }
        Ok(result)
    }
}
