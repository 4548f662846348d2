//! Structured completion provider: the abstraction over LLM vendors.
//!
//! A provider sends a system prompt plus message history to a chat-completion
//! service and *forces* the reply through a single named output schema
//! (Anthropic tool use, OpenAI function calling). Providers return the raw
//! payload they found; interpreting it is the normalizer's job.
//!
//! Implementations: Anthropic, OpenAI-compatible, canned (no credential).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// A single request to a structured completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use (e.g., "claude-3-5-haiku-latest")
    pub model: String,

    /// System prompt (persona, context, output contract)
    pub system_prompt: String,

    /// History followed by the new user turn, role/content only
    pub messages: Vec<Message>,

    /// The schema the reply is forced through
    pub output_schema: OutputSchema,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.3
}

/// A named JSON schema the model must answer through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    /// Tool/function name the model is forced to call
    pub name: String,

    /// Description shown to the model
    pub description: String,

    /// JSON Schema of the tool input
    pub schema: serde_json::Value,
}

/// Where a raw completion came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompletionSource {
    /// Returned by the completion service
    Live,
    /// Built-in answer used because the service was unavailable or unconfigured
    Canned { reason: String },
}

/// Whatever the provider produced, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCompletion {
    /// The forced tool input when found, otherwise the raw response envelope
    pub payload: serde_json::Value,

    /// Which model actually responded
    pub model: String,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    pub source: CompletionSource,
}

impl RawCompletion {
    pub fn live(payload: serde_json::Value, model: impl Into<String>, usage: Option<Usage>) -> Self {
        Self {
            payload,
            model: model.into(),
            usage,
            source: CompletionSource::Live,
        }
    }

    pub fn canned(payload: serde_json::Value, reason: impl Into<String>) -> Self {
        Self {
            payload,
            model: "canned".into(),
            usage: None,
            source: CompletionSource::Canned {
                reason: reason.into(),
            },
        }
    }

    pub fn is_canned(&self) -> bool {
        matches!(self.source, CompletionSource::Canned { .. })
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The capability every LLM vendor integration implements.
///
/// The answer pipeline calls `create_completion()` without knowing which
/// vendor is behind it, so tests substitute a scripted implementation.
#[async_trait]
pub trait StructuredCompletionProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic", "canned").
    fn name(&self) -> &str;

    /// Send a request and get the raw structured result.
    async fn create_completion(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<RawCompletion, ProviderError>;

    /// Whether a credential is available. Unconfigured providers still answer,
    /// but only with canned content.
    fn is_configured(&self) -> bool {
        true
    }

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
