//! Per-session conversation state.
//!
//! History is append-only; the rolling summary and proficiency level are
//! replaced wholesale. The web widget keeps this state client-side and sends
//! it with each request; in-process callers (the CLI) hold it here.

use coursemate_core::answer::StructuredAnswer;
use coursemate_core::message::Message;
use coursemate_core::proficiency::ProficiencyLevel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    history: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(default)]
    proficiency: ProficiencyLevel,
}

impl ConversationState {
    pub fn new(proficiency: ProficiencyLevel) -> Self {
        Self {
            proficiency,
            ..Self::default()
        }
    }

    pub fn append_turn(&mut self, message: Message) {
        self.history.push(message);
    }

    pub fn replace_summary(&mut self, summary: impl Into<String>) {
        self.summary = Some(summary.into());
    }

    pub fn set_proficiency(&mut self, level: ProficiencyLevel) {
        self.proficiency = level;
    }

    /// Record a question and its answer. The summary is replaced only when
    /// the answer carries one.
    pub fn record_exchange(&mut self, question: &str, answer: &StructuredAnswer) {
        self.append_turn(Message::user(question));
        self.append_turn(
            Message::assistant(&answer.answer_text)
                .with_metadata(answer.follow_up_questions.clone(), answer.sources.clone()),
        );
        if let Some(summary) = &answer.conversation_summary {
            self.replace_summary(summary.clone());
        }
    }

    /// History in order, role and content only.
    pub fn replay_history(&self) -> Vec<Message> {
        self.history.iter().map(Message::for_replay).collect()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn proficiency(&self) -> ProficiencyLevel {
        self.proficiency
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
