//! Canned provider used when no completion credential is configured.
//!
//! Answers every question with the same built-in payload so the assistant
//! stays usable (and demo-able) without an API key. The payload is in the
//! normal structured shape and goes through the normalizer like any other.

use async_trait::async_trait;
use coursemate_core::error::ProviderError;
use coursemate_core::provider::*;

/// Why the canned provider is answering.
pub const NOT_CONFIGURED_REASON: &str = "API key not configured";

/// The built-in answer payload.
pub fn canned_answer_payload() -> serde_json::Value {
    serde_json::json!({
        "answer": {
            "text": "Large Language Models (LLMs) are sophisticated AI systems trained on vast amounts of text data to understand and generate human-like language. They work by predicting the next word in a sequence based on patterns learned during training."
        },
        "followUpQuestions": [
            "How do LLMs work?",
            "What are some examples of LLMs?",
            "What are the limitations of current LLMs?"
        ],
        "conversationSummary": "Discussion about Large Language Models and their capabilities."
    })
}

/// A provider with no backing service.
#[derive(Debug, Clone)]
pub struct CannedProvider {
    reason: String,
}

impl CannedProvider {
    pub fn new() -> Self {
        Self {
            reason: NOT_CONFIGURED_REASON.into(),
        }
    }

    /// Canned provider with a specific reason recorded on each completion.
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for CannedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StructuredCompletionProvider for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }

    async fn create_completion(
        &self,
        _request: CompletionRequest,
    ) -> std::result::Result<RawCompletion, ProviderError> {
        Ok(RawCompletion::canned(canned_answer_payload(), &self.reason))
    }

    fn is_configured(&self) -> bool {
        false
    }
}
