//! Student proficiency levels.
//!
//! The declared level controls two things: how strict retrieval is about
//! relevance, and the register/verbosity the assistant is told to use.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A user-declared comprehension tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProficiencyLevel {
    #[serde(alias = "beginner")]
    Beginner,
    #[default]
    #[serde(alias = "intermediate")]
    Intermediate,
    #[serde(alias = "expert")]
    Expert,
}

impl ProficiencyLevel {
    pub const ALL: [ProficiencyLevel; 3] = [
        ProficiencyLevel::Beginner,
        ProficiencyLevel::Intermediate,
        ProficiencyLevel::Expert,
    ];

    /// Minimum relevance score a retrieved passage needs at this level.
    ///
    /// Beginners only get the most confident matches; experts tolerate
    /// noisier, more technical ones.
    pub fn relevance_threshold(&self) -> f64 {
        match self {
            ProficiencyLevel::Beginner => 0.7,
            ProficiencyLevel::Intermediate => 0.5,
            ProficiencyLevel::Expert => 0.3,
        }
    }

    /// Style directives injected into the system prompt.
    pub fn style_rules(&self) -> &'static str {
        match self {
            ProficiencyLevel::Beginner => {
                "Use very simple everyday words and no jargon, as if explaining to someone who \
                 has never used the technology. Focus on the fundamentals, using analogies and \
                 simple examples. Avoid technical implementation details. Keep responses under \
                 150 words."
            }
            ProficiencyLevel::Intermediate => {
                "Use moderate technical terminology with brief explanations of complex concepts, \
                 as if explaining to a first-year college student. Include practical examples. \
                 Responses can be 150-250 words."
            }
            ProficiencyLevel::Expert => {
                "Use precise technical language and industry terminology. Include implementation \
                 considerations, tradeoffs, and edge cases. Advanced concepts may be referenced \
                 without extensive explanation. Responses can be 200-300 words."
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProficiencyLevel::Beginner => "Beginner",
            ProficiencyLevel::Intermediate => "Intermediate",
            ProficiencyLevel::Expert => "Expert",
        }
    }

    /// Parse a caller-supplied level, falling back to the default on anything
    /// unrecognized. Callers send free text; an unknown level must not fail a turn.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.parse() {
            Ok(level) => level,
            Err(_) => {
                if !raw.trim().is_empty() {
                    tracing::debug!(level = %raw, "Unknown proficiency level, using default");
                }
                Self::default()
            }
        }
    }
}

impl std::fmt::Display for ProficiencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a proficiency level name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown proficiency level: {0}")]
pub struct UnknownLevel(pub String);

impl FromStr for ProficiencyLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(ProficiencyLevel::Beginner),
            "intermediate" => Ok(ProficiencyLevel::Intermediate),
            "expert" => Ok(ProficiencyLevel::Expert),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}
