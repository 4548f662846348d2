//! Error types for the Coursemate domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Only [`InputError`] ever reaches an end user as a hard failure. Retrieval
//! and provider errors are recovered inside the answer pipeline; they exist
//! so adapters can report *why* they failed and the pipeline can log it.

use thiserror::Error;

/// The top-level error type for Coursemate operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Caller input ---
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Retrieval errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Rejections of the caller's request. Surfaced as a 4xx, never recovered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Message is required")]
    MissingMessage,

    #[error("Query is required")]
    MissingQuery,
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unparseable provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),

    #[error("Vector store request failed: {message} (status: {status_code})")]
    QueryFailed { status_code: u16, message: String },

    #[error("Malformed query result: {0}")]
    Malformed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Retrieval timed out after {0}s")]
    Timeout(u64),

    #[error("Vector store not configured: {0}")]
    NotConfigured(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 529,
            message: "Overloaded".into(),
        });
        assert!(err.to_string().contains("529"));
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn missing_message_matches_wire_text() {
        let err = InputError::MissingMessage;
        assert_eq!(err.to_string(), "Message is required");
    }

    #[test]
    fn retrieval_error_converts_into_top_level() {
        let err: Error = RetrievalError::Timeout(5).into();
        assert!(matches!(err, Error::Retrieval(RetrievalError::Timeout(5))));
        assert!(err.to_string().contains("5s"));
    }
}
