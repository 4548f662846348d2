//! The retrieval client: what the answer pipeline calls to ground a turn.
//!
//! Wraps a [`VectorStore`] with the policy the pipeline relies on:
//! - the same top-K for every proficiency level
//! - relevance filtering by the level's threshold
//! - a bounded wait
//! - generic fallback passages when the store fails, so a turn never fails
//!   because retrieval did

use std::sync::Arc;
use std::time::Duration;

use coursemate_core::error::RetrievalError;
use coursemate_core::passage::RetrievedPassage;
use coursemate_core::proficiency::ProficiencyLevel;
use coursemate_core::retrieval::{DEFAULT_TOP_K, VectorStore};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Upper bound on passages returned by a single raw search.
pub const MAX_SEARCH_RESULTS: usize = 20;

/// Which kind of store the client is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    /// A real vector store holding the indexed course
    Primary,
    /// The built-in index, because no store is configured or reachable
    Fallback,
}

impl StoreMode {
    /// Label reported by the health endpoint.
    pub fn label(&self) -> &'static str {
        match self {
            StoreMode::Primary => "real data",
            StoreMode::Fallback => "mock data",
        }
    }
}

/// Passages for one turn, and whether they came from the fallback set.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOutcome {
    pub passages: Vec<RetrievedPassage>,
    /// True when retrieval failed and the generic passages were substituted
    pub degraded: bool,
}

/// Generic passages used when the store cannot answer.
pub fn fallback_passages() -> Vec<RetrievedPassage> {
    vec![
        RetrievedPassage::new(
            "Large Language Models (LLMs) are sophisticated AI systems trained on vast amounts of text data to understand and generate human-like language.",
            "AI Foundations",
            "module1/llms.html",
            0.0,
        ),
        RetrievedPassage::new(
            "LLMs work through a process called transformer architecture, which allows them to process text in parallel and learn complex relationships between words and concepts.",
            "AI Technical Concepts",
            "module2/transformers.html",
            0.0,
        ),
    ]
}

pub struct RetrievalClient {
    store: Arc<dyn VectorStore>,
    mode: StoreMode,
    top_k: usize,
    timeout: Duration,
}

impl RetrievalClient {
    pub fn new(store: Arc<dyn VectorStore>, mode: StoreMode) -> Self {
        Self {
            store,
            mode,
            top_k: DEFAULT_TOP_K,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Query the store with the timeout applied.
    async fn query_store(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        let result = tokio::time::timeout(self.timeout, self.store.query(query, top_k))
            .await
            .map_err(|_| RetrievalError::Timeout(self.timeout.as_secs()))??;
        result.into_passages()
    }

    /// Passages for a question, filtered by the level's relevance threshold.
    ///
    /// Never fails: any store error is logged and the fallback passages are
    /// returned with `degraded` set. Fallback passages skip the threshold.
    pub async fn retrieve(&self, question: &str, level: ProficiencyLevel) -> RetrievalOutcome {
        let threshold = level.relevance_threshold();

        match self.query_store(question, self.top_k).await {
            Ok(passages) => {
                let returned = passages.len();
                let passages: Vec<RetrievedPassage> =
                    passages.into_iter().filter(|p| p.meets(threshold)).collect();
                debug!(
                    store = self.store.name(),
                    %level,
                    threshold,
                    returned,
                    kept = passages.len(),
                    "Retrieved course passages"
                );
                RetrievalOutcome {
                    passages,
                    degraded: false,
                }
            }
            Err(e) => {
                warn!(store = self.store.name(), error = %e, "Retrieval failed, using fallback passages");
                RetrievalOutcome {
                    passages: fallback_passages(),
                    degraded: true,
                }
            }
        }
    }

    /// Raw semantic search with no threshold and no fallback. The result
    /// count is clamped to `1..=MAX_SEARCH_RESULTS`.
    pub async fn search(
        &self,
        query: &str,
        num_results: usize,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        let passages = self
            .query_store(query, num_results.clamp(1, MAX_SEARCH_RESULTS))
            .await?;
        info!(store = self.store.name(), count = passages.len(), "Search completed");
        Ok(passages)
    }

    pub async fn health_check(&self) -> Result<bool, RetrievalError> {
        tokio::time::timeout(self.timeout, self.store.health_check())
            .await
            .map_err(|_| RetrievalError::Timeout(self.timeout.as_secs()))?
    }
}
