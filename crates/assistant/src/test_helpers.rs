//! Scripted collaborators for pipeline tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use coursemate_core::error::{ProviderError, RetrievalError};
use coursemate_core::provider::{CompletionRequest, RawCompletion, StructuredCompletionProvider};
use coursemate_core::retrieval::{PassageMetadata, QueryResult, VectorStore};
use serde_json::Value;

/// A provider that returns a sequence of scripted payloads and records
/// every request it receives.
pub struct ScriptedProvider {
    payloads: Mutex<Vec<Value>>,
    requests: Mutex<Vec<CompletionRequest>>,
    configured: bool,
}

impl ScriptedProvider {
    pub fn new(payloads: Vec<Value>) -> Self {
        Self {
            payloads: Mutex::new(payloads),
            requests: Mutex::new(Vec::new()),
            configured: true,
        }
    }

    /// Always answers with a well-formed payload.
    pub fn canonical() -> Self {
        Self::new(vec![canonical_payload("A transformer is a neural network architecture.")])
    }

    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl StructuredCompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn create_completion(&self, request: CompletionRequest) -> Result<RawCompletion, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let payloads = self.payloads.lock().unwrap();
        // Repeat the last payload once the script runs out
        let payload = payloads
            .get(requests.len())
            .or_else(|| payloads.last())
            .cloned()
            .unwrap_or(Value::Null);
        requests.push(request);
        Ok(RawCompletion::live(payload, "scripted-model", None))
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}

pub fn canonical_payload(text: &str) -> Value {
    serde_json::json!({
        "answer": {"text": text},
        "followUpQuestions": ["What is attention?", "What are embeddings?"],
        "conversationSummary": "Discussed transformers."
    })
}

pub struct FailingProvider;

#[async_trait]
impl StructuredCompletionProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn create_completion(&self, _request: CompletionRequest) -> Result<RawCompletion, ProviderError> {
        Err(ProviderError::ApiError {
            status_code: 529,
            message: "Overloaded".into(),
        })
    }
}

pub struct SlowProvider;

#[async_trait]
impl StructuredCompletionProvider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }

    async fn create_completion(&self, _request: CompletionRequest) -> Result<RawCompletion, ProviderError> {
        tokio::time::sleep(Duration::from_secs(300)).await;
        Err(ProviderError::Timeout("unreachable".into()))
    }
}

/// A store returning fixed `(content, location, score)` passages.
pub struct FixedStore {
    passages: Vec<(String, String, f64)>,
}

impl FixedStore {
    pub fn new(passages: &[(&str, &str, f64)]) -> Self {
        Self {
            passages: passages
                .iter()
                .map(|(c, l, s)| (c.to_string(), l.to_string(), *s))
                .collect(),
        }
    }
}

#[async_trait]
impl VectorStore for FixedStore {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn query(&self, _query_text: &str, top_k: usize) -> Result<QueryResult, RetrievalError> {
        let mut result = QueryResult::default();
        for (content, location, score) in self.passages.iter().take(top_k) {
            result.documents.push(content.clone());
            result.metadatas.push(PassageMetadata {
                source: Some("AI Technical Concepts".into()),
                location: Some(location.clone()),
                section_title: None,
            });
            result.scores.push(*score);
        }
        Ok(result)
    }
}

pub struct DownStore;

#[async_trait]
impl VectorStore for DownStore {
    fn name(&self) -> &str {
        "down"
    }

    async fn query(&self, _query_text: &str, _top_k: usize) -> Result<QueryResult, RetrievalError> {
        Err(RetrievalError::Unavailable("connection refused".into()))
    }
}
