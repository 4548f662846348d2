//! # Coursemate Core
//!
//! Domain types, capability traits, and error definitions for the Coursemate
//! course assistant. This crate performs **no I/O**: it defines the domain
//! model that the retrieval, provider, and assistant crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping the vector store or LLM vendor via configuration
//! - Testing the answer pipeline with scripted mock collaborators
//! - Clean dependency graph (all crates depend inward on core)

pub mod answer;
pub mod error;
pub mod message;
pub mod passage;
pub mod proficiency;
pub mod provider;
pub mod retrieval;

// Re-export key types at crate root for ergonomics
pub use answer::{Citation, LegacyReply, StructuredAnswer};
pub use error::{Error, InputError, ProviderError, Result, RetrievalError};
pub use message::{Message, Role};
pub use passage::RetrievedPassage;
pub use proficiency::ProficiencyLevel;
pub use provider::{
    CompletionRequest, CompletionSource, OutputSchema, RawCompletion,
    StructuredCompletionProvider, Usage,
};
pub use retrieval::{Embedder, PassageMetadata, QueryResult, VectorStore};
