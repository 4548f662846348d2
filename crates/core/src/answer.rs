//! The structured answer contract.
//!
//! [`StructuredAnswer`] is what the normalizer guarantees to produce and what
//! callers receive. On the wire it is serialized in the shape the web widget
//! expects:
//!
//! ```json
//! {
//!   "answer": { "text": "..." },
//!   "followUpQuestions": ["...", "..."],
//!   "conversationSummary": "...",
//!   "sources": [ { "id": 1, "title": "...", "url": "...", "section_title": "...", "relevance_score": 0.82 } ]
//! }
//! ```
//!
//! Citation fields stay snake_case on the wire: the widget reads
//! `relevance_score` and `section_title` by those names.
//!
//! Legacy callers that only understand `{"reply": "..."}` get [`LegacyReply`].

use serde::{Deserialize, Serialize};

/// A validated answer: text, 1–3 follow-up questions, optional rolling summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireAnswer", from = "WireAnswer")]
pub struct StructuredAnswer {
    pub answer_text: String,
    pub follow_up_questions: Vec<String>,
    pub conversation_summary: Option<String>,
    /// Course pages the answer was grounded on. Attached by the pipeline,
    /// never by the model.
    pub sources: Vec<Citation>,
}

impl StructuredAnswer {
    pub fn new(answer_text: impl Into<String>, follow_up_questions: Vec<String>) -> Self {
        Self {
            answer_text: answer_text.into(),
            follow_up_questions,
            conversation_summary: None,
            sources: Vec::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.conversation_summary = Some(summary.into());
        self
    }

    pub fn with_sources(mut self, sources: Vec<Citation>) -> Self {
        self.sources = sources;
        self
    }

    /// The single-field shape older widgets consume.
    pub fn to_legacy(&self) -> LegacyReply {
        LegacyReply {
            reply: self.answer_text.clone(),
        }
    }
}

/// `{"reply": "..."}` for callers predating structured answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyReply {
    pub reply: String,
}

/// A course page cited under an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based position after deduplication
    pub id: u32,
    pub title: String,
    pub url: String,
    #[serde(default, alias = "sectionTitle", skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    #[serde(alias = "relevanceScore")]
    pub relevance_score: f64,
}

// --- Wire shape ---

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAnswer {
    answer: WireAnswerText,
    follow_up_questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    conversation_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sources: Vec<Citation>,
}

#[derive(Serialize, Deserialize)]
struct WireAnswerText {
    text: String,
}

impl From<StructuredAnswer> for WireAnswer {
    fn from(a: StructuredAnswer) -> Self {
        Self {
            answer: WireAnswerText { text: a.answer_text },
            follow_up_questions: a.follow_up_questions,
            conversation_summary: a.conversation_summary,
            sources: a.sources,
        }
    }
}

impl From<WireAnswer> for StructuredAnswer {
    fn from(w: WireAnswer) -> Self {
        Self {
            answer_text: w.answer.text,
            follow_up_questions: w.follow_up_questions,
            conversation_summary: w.conversation_summary,
            sources: w.sources,
        }
    }
}
