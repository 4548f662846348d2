//! Retrieval collaborator contracts.
//!
//! The vector store is owned externally; the core only needs
//! `query(text, top_k) -> {documents, metadatas, scores}`. Indexing and
//! persistence formats are none of its business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;
use crate::passage::RetrievedPassage;

/// Number of passages requested per question, independent of proficiency.
pub const DEFAULT_TOP_K: usize = 4;

/// Label used when the store omits source metadata.
const UNKNOWN: &str = "Unknown";

/// Per-document metadata as stored alongside the embedding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassageMetadata {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub section_title: Option<String>,
}

/// Parallel arrays returned by a semantic search, best match first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub documents: Vec<String>,
    pub metadatas: Vec<PassageMetadata>,
    /// Similarity in [0, 1], one per document
    pub scores: Vec<f64>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Zip the parallel arrays into passages.
    ///
    /// Fails when the arrays disagree in length or a score is not a finite
    /// number; both mean the store answered with something we cannot trust.
    pub fn into_passages(self) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        let n = self.documents.len();
        if self.scores.len() != n {
            return Err(RetrievalError::Malformed(format!(
                "{n} documents but {} scores",
                self.scores.len()
            )));
        }
        if !self.metadatas.is_empty() && self.metadatas.len() != n {
            return Err(RetrievalError::Malformed(format!(
                "{n} documents but {} metadata entries",
                self.metadatas.len()
            )));
        }
        if let Some(bad) = self.scores.iter().find(|s| !s.is_finite()) {
            return Err(RetrievalError::Malformed(format!("non-finite score {bad}")));
        }

        let mut metadatas = self.metadatas.into_iter();
        let passages = self
            .documents
            .into_iter()
            .zip(self.scores)
            .map(|(content, score)| {
                let meta = metadatas.next().unwrap_or_default();
                let mut passage = RetrievedPassage::new(
                    content,
                    meta.source.unwrap_or_else(|| UNKNOWN.into()),
                    meta.location.unwrap_or_else(|| UNKNOWN.into()),
                    score,
                );
                passage.section_title = meta.section_title;
                passage
            })
            .collect();

        Ok(passages)
    }
}

/// A semantic search interface over the course-content passage store.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// A short name for logs and health output (e.g., "supabase", "memory").
    fn name(&self) -> &str;

    /// Return up to `top_k` passages most similar to `query_text`.
    async fn query(&self, query_text: &str, top_k: usize) -> Result<QueryResult, RetrievalError>;

    /// Health check: can we reach the store?
    async fn health_check(&self) -> Result<bool, RetrievalError> {
        Ok(true)
    }
}

/// Turns text into a query embedding for stores that need one.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(source: &str, location: &str) -> PassageMetadata {
        PassageMetadata {
            source: Some(source.into()),
            location: Some(location.into()),
            section_title: None,
        }
    }

    #[test]
    fn zips_parallel_arrays() {
        let result = QueryResult {
            documents: vec!["a".into(), "b".into()],
            metadatas: vec![meta("Mod 1", "m1.html"), meta("Mod 2", "m2.html")],
            scores: vec![0.9, 0.4],
        };
        let passages = result.into_passages().unwrap();
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[1].source_label, "Mod 2");
        assert!((passages[1].relevance_score - 0.4).abs() < 1e-6);
    }

    #[test]
    fn missing_metadata_is_unknown() {
        let result = QueryResult {
            documents: vec!["a".into()],
            metadatas: vec![],
            scores: vec![0.5],
        };
        let passages = result.into_passages().unwrap();
        assert_eq!(passages[0].source_label, "Unknown");
        assert_eq!(passages[0].location, "Unknown");
    }

    #[test]
    fn length_mismatch_is_malformed() {
        let result = QueryResult {
            documents: vec!["a".into(), "b".into()],
            metadatas: vec![],
            scores: vec![0.5],
        };
        assert!(matches!(result.into_passages(), Err(RetrievalError::Malformed(_))));
    }

    #[test]
    fn nan_score_is_malformed() {
        let result = QueryResult {
            documents: vec!["a".into()],
            metadatas: vec![],
            scores: vec![f64::NAN],
        };
        assert!(matches!(result.into_passages(), Err(RetrievalError::Malformed(_))));
    }
}
