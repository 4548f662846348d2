//! The answer pipeline: one student question in, one structured answer out.
//!
//! # Flow
//!
//! 1. Validate the request (the only step that can fail)
//! 2. Retrieve passages above the level's relevance threshold
//! 3. Compose the system prompt
//! 4. Invoke the provider with history and the question
//! 5. Normalize the payload into a `StructuredAnswer`
//! 6. Attach citations for the passages the prompt was grounded on
//!
//! Retrieval and completion failures are absorbed by their components, so
//! once the request is valid an answer is always produced.

use std::sync::Arc;

use coursemate_config::AppConfig;
use coursemate_core::answer::StructuredAnswer;
use coursemate_core::error::InputError;
use coursemate_core::message::Message;
use coursemate_core::proficiency::ProficiencyLevel;
use coursemate_core::provider::StructuredCompletionProvider;
use coursemate_retrieval::{RetrievalClient, StoreMode};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use crate::citations::build_citations;
use crate::composer::PromptComposer;
use crate::conversation::ConversationState;
use crate::invoker::CompletionInvoker;
use crate::normalizer::normalize;

/// A chat request as sent by the web widget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    #[serde(default)]
    pub message: String,

    /// Turns the widget cannot have produced (unknown role, no content) are
    /// dropped rather than failing the request.
    #[serde(default, deserialize_with = "lenient_history")]
    pub conversation_history: Vec<Message>,

    /// Free text; unknown values mean Intermediate
    #[serde(default)]
    pub proficiency_level: Option<String>,

    #[serde(default)]
    pub conversation_summary: Option<String>,
}

fn lenient_history<'de, D>(deserializer: D) -> Result<Vec<Message>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Message>(entry) {
            Ok(message) => Some(message),
            Err(e) => {
                debug!(error = %e, "Skipping unusable history entry");
                None
            }
        })
        .collect())
}

impl AnswerRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn proficiency(&self) -> ProficiencyLevel {
        self.proficiency_level
            .as_deref()
            .map(ProficiencyLevel::parse_lenient)
            .unwrap_or_default()
    }
}

pub struct AnswerPipeline {
    retrieval: Arc<RetrievalClient>,
    composer: PromptComposer,
    invoker: CompletionInvoker,
}

impl AnswerPipeline {
    pub fn new(
        retrieval: Arc<RetrievalClient>,
        composer: PromptComposer,
        invoker: CompletionInvoker,
    ) -> Self {
        Self {
            retrieval,
            composer,
            invoker,
        }
    }

    /// Assemble from explicit collaborators, everything else from config.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn StructuredCompletionProvider>,
        retrieval: Arc<RetrievalClient>,
    ) -> Self {
        Self::new(
            retrieval,
            PromptComposer::new(&config.assistant.course_name),
            CompletionInvoker::from_config(provider, config),
        )
    }

    /// Build the provider and connect the vector store described by config.
    pub async fn connect(config: &AppConfig) -> Self {
        let provider = coursemate_providers::build_from_config(config);
        let retrieval = Arc::new(coursemate_retrieval::connect(config).await);
        Self::from_config(config, provider, retrieval)
    }

    pub fn retrieval(&self) -> &RetrievalClient {
        &self.retrieval
    }

    pub fn store_mode(&self) -> StoreMode {
        self.retrieval.mode()
    }

    pub fn provider_name(&self) -> &str {
        self.invoker.provider_name()
    }

    /// Whether answers come from a live provider rather than canned content.
    pub fn is_live(&self) -> bool {
        self.invoker.is_live()
    }

    pub fn course_name(&self) -> &str {
        self.composer.course_name()
    }

    /// Answer a stateless request. The caller owns the conversation state;
    /// when the answer has no new summary the request's summary is echoed
    /// back so the caller never loses it.
    pub async fn answer_question(
        &self,
        request: AnswerRequest,
    ) -> Result<StructuredAnswer, InputError> {
        let question = request.message.trim();
        if question.is_empty() {
            return Err(InputError::MissingMessage);
        }

        let summary = request
            .conversation_summary
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let mut answer = self
            .run_turn(question, request.proficiency(), &request.conversation_history, summary)
            .await;

        if answer.conversation_summary.is_none() {
            if let Some(previous) = summary {
                answer = answer.with_summary(previous);
            }
        }
        Ok(answer)
    }

    /// Answer within an in-process conversation and record the exchange.
    pub async fn answer_turn(
        &self,
        state: &mut ConversationState,
        question: &str,
    ) -> Result<StructuredAnswer, InputError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(InputError::MissingMessage);
        }

        let answer = self
            .run_turn(question, state.proficiency(), state.history(), state.summary())
            .await;
        state.record_exchange(question, &answer);
        Ok(answer)
    }

    async fn run_turn(
        &self,
        question: &str,
        level: ProficiencyLevel,
        history: &[Message],
        summary: Option<&str>,
    ) -> StructuredAnswer {
        let span = info_span!("turn", turn_id = %Uuid::new_v4());
        self.run_turn_inner(question, level, history, summary)
            .instrument(span)
            .await
    }

    async fn run_turn_inner(
        &self,
        question: &str,
        level: ProficiencyLevel,
        history: &[Message],
        summary: Option<&str>,
    ) -> StructuredAnswer {
        debug!(history = history.len(), "Retrieving course passages");
        let outcome = self.retrieval.retrieve(question, level).await;
        let prompt = self.composer.compose(level, summary, &outcome.passages);
        let raw = self.invoker.complete(prompt, history, question).await;
        let canned = raw.is_canned();
        let normalized = normalize(raw.payload);

        // Fallback passages and fallback answers are not grounded on course pages
        let sources = if outcome.degraded || normalized.path.is_fallback() {
            Vec::new()
        } else {
            build_citations(&outcome.passages)
        };

        info!(
            %level,
            passages = outcome.passages.len(),
            degraded = outcome.degraded,
            canned,
            path = ?normalized.path,
            citations = sources.len(),
            "Answered question"
        );

        normalized.answer.with_sources(sources)
    }
}
