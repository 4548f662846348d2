//! Structured completion providers for Coursemate.
//!
//! All providers implement `coursemate_core::StructuredCompletionProvider`.
//! The router selects the provider to answer with based on configuration.

pub mod anthropic;
pub mod canned;
pub mod openai_compat;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use canned::{CannedProvider, canned_answer_payload};
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};

/// Shared HTTP client for provider calls. The completion timeout proper is
/// enforced by the caller; this is only an upper bound on a stuck socket.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
