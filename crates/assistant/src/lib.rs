//! # Coursemate Assistant
//!
//! The retrieval-augmented answer pipeline: retrieve course passages,
//! compose a proficiency-aware prompt, force a structured completion,
//! normalize whatever comes back, and cite the pages used.

pub mod citations;
pub mod composer;
pub mod conversation;
pub mod invoker;
pub mod normalizer;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use citations::build_citations;
pub use composer::PromptComposer;
pub use conversation::ConversationState;
pub use invoker::{CompletionInvoker, RESPONSE_TOOL_NAME, response_schema};
pub use normalizer::{NormalizationPath, Normalized, fallback_answer, normalize};
pub use pipeline::{AnswerPipeline, AnswerRequest};
