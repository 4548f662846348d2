//! Retrieved course passages.

use serde::{Deserialize, Serialize};

/// A scored excerpt of course content returned by semantic search.
///
/// Produced fresh for each query and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedPassage {
    /// The passage text
    pub content: String,

    /// Human-readable source (course module or page title)
    pub source_label: String,

    /// Where the passage lives on the site (relative URL, possibly with anchor)
    pub location: String,

    /// Similarity to the query, in [0, 1]
    pub relevance_score: f64,

    /// Section heading within the source page, when the store knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
}

impl RetrievedPassage {
    pub fn new(
        content: impl Into<String>,
        source_label: impl Into<String>,
        location: impl Into<String>,
        relevance_score: f64,
    ) -> Self {
        Self {
            content: content.into(),
            source_label: source_label.into(),
            location: location.into(),
            relevance_score: relevance_score.clamp(0.0, 1.0),
            section_title: None,
        }
    }

    pub fn with_section(mut self, section_title: impl Into<String>) -> Self {
        self.section_title = Some(section_title.into());
        self
    }

    /// Whether this passage clears a relevance threshold (inclusive).
    pub fn meets(&self, threshold: f64) -> bool {
        self.relevance_score >= threshold
    }
}
