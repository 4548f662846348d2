//! Conversation message types.
//!
//! A [`Message`] is one turn of a student's session. The web widget attaches
//! display metadata (follow-up questions, citations) to assistant turns; that
//! metadata round-trips through the session but is stripped before history is
//! replayed to a completion provider.

use serde::{Deserialize, Serialize};

use crate::answer::Citation;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The student
    User,
    /// The course assistant. Older widgets send `bot`.
    #[serde(alias = "bot")]
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Follow-up suggestions shown under an assistant turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_up_questions: Vec<String>,

    /// Citations shown under an assistant turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Citation>,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            follow_up_questions: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            follow_up_questions: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Attach display metadata to an assistant turn.
    pub fn with_metadata(mut self, follow_up_questions: Vec<String>, sources: Vec<Citation>) -> Self {
        self.follow_up_questions = follow_up_questions;
        self.sources = sources;
        self
    }

    /// Role and content only, as sent to a completion provider.
    pub fn for_replay(&self) -> Self {
        Self {
            role: self.role,
            content: self.content.clone(),
            follow_up_questions: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Whether display metadata is attached.
    pub fn has_metadata(&self) -> bool {
        !self.follow_up_questions.is_empty() || !self.sources.is_empty()
    }
}
