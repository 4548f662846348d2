//! System prompt construction.
//!
//! The prompt is assembled from fixed sections in a fixed order:
//!
//! 1. Persona (names the course)
//! 2. Conversation context (rolling summary)
//! 3. Proficiency guidelines for the active level
//! 4. Scope guidelines
//! 5. Course knowledge (numbered passages)
//! 6. Answer format and output contract
//!
//! Composition is deterministic: identical inputs give identical prompts.
//! The question itself is not part of the system prompt; it travels as the
//! final user turn.

use coursemate_core::passage::RetrievedPassage;
use coursemate_core::proficiency::ProficiencyLevel;

use crate::invoker::RESPONSE_TOOL_NAME;

const NEW_CONVERSATION: &str = "This is a new conversation.";
const NO_COURSE_CONTENT: &str = "No specific course content available for this query.";

#[derive(Debug, Clone)]
pub struct PromptComposer {
    course_name: String,
}

impl PromptComposer {
    pub fn new(course_name: impl Into<String>) -> Self {
        Self {
            course_name: course_name.into(),
        }
    }

    pub fn course_name(&self) -> &str {
        &self.course_name
    }

    /// Build the system prompt for one turn.
    pub fn compose(
        &self,
        level: ProficiencyLevel,
        summary: Option<&str>,
        passages: &[RetrievedPassage],
    ) -> String {
        let summary = summary
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(NEW_CONVERSATION);

        let sections = [
            format!(
                "You are an AI assistant for the {} course. Your purpose is to help students understand AI concepts.",
                self.course_name
            ),
            format!("CONVERSATION CONTEXT:\n{summary}"),
            format!(
                "PROFICIENCY LEVEL GUIDELINES:\n- {level}: {}\n\nThe user's current proficiency level is: {level}",
                level.style_rules()
            ),
            "GUIDELINES:\n\
             - Answer questions only related to the course content\n\
             - For off-topic questions, politely redirect to course material\n\
             - If uncertain, indicate when you need more information\n\
             - If technical explanations are needed, provide examples\n\
             - Use your general knowledge of AI and ML to provide accurate information"
                .to_string(),
            format!("COURSE KNOWLEDGE:\n{}", format_passages(passages)),
            format!(
                "ANSWER FORMAT:\n\
                 1. Provide a clear, direct answer to the question\n\
                 2. Suggest at least 1 to max 3 relevant follow-up questions\n\n\
                 IMPORTANT: Do not cite specific sources in your responses. \
                 You MUST use the {RESPONSE_TOOL_NAME} tool to structure your response with the exact JSON schema provided.\n\
                 Your answer should have 'answer.text', 'followUpQuestions', and 'conversationSummary'."
            ),
        ];

        sections.join("\n\n")
    }
}

/// `[i] content\nSource: label (location)`, numbered from 1.
fn format_passages(passages: &[RetrievedPassage]) -> String {
    if passages.is_empty() {
        return NO_COURSE_CONTENT.to_string();
    }
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                "[{}] {}\nSource: {} ({})",
                i + 1,
                p.content,
                p.source_label,
                p.location
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
