//! Structured completion invocation.
//!
//! Sends the composed system prompt, the replayed history, and the new
//! question to the configured provider, forcing the reply through the
//! `response_formatter` schema. Provider failures never reach the caller:
//! they are logged and replaced by the canned answer payload.

use std::sync::Arc;
use std::time::Duration;

use coursemate_config::AppConfig;
use coursemate_core::message::{Message, Role};
use coursemate_core::provider::{
    CompletionRequest, OutputSchema, RawCompletion, StructuredCompletionProvider,
};
use coursemate_providers::canned::{NOT_CONFIGURED_REASON, canned_answer_payload};
use tracing::{debug, error, info};

/// Name of the tool the model is forced to call.
pub const RESPONSE_TOOL_NAME: &str = "response_formatter";

/// The schema every answer is forced through.
pub fn response_schema() -> OutputSchema {
    OutputSchema {
        name: RESPONSE_TOOL_NAME.into(),
        description: "Structure the answer to the student's question with follow-up questions and an updated conversation summary.".into(),
        schema: serde_json::json!({
            "type": "object",
            "properties": {
                "answer": {
                    "type": "object",
                    "properties": {
                        "text": {"type": "string"}
                    },
                    "required": ["text"]
                },
                "followUpQuestions": {
                    "type": "array",
                    "items": {"type": "string"},
                    "minItems": 1,
                    "maxItems": 3
                },
                "conversationSummary": {"type": "string"}
            },
            "required": ["answer", "followUpQuestions"]
        }),
    }
}

/// The most recent `max_messages` turns, starting on a user turn, with
/// display metadata stripped.
pub fn replay_window(history: &[Message], max_messages: usize) -> Vec<Message> {
    let start = history.len().saturating_sub(max_messages);
    history[start..]
        .iter()
        .skip_while(|m| m.role != Role::User)
        .map(Message::for_replay)
        .collect()
}

pub struct CompletionInvoker {
    provider: Arc<dyn StructuredCompletionProvider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    max_history: usize,
}

impl CompletionInvoker {
    pub fn new(provider: Arc<dyn StructuredCompletionProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.3,
            max_tokens: 1000,
            timeout: Duration::from_secs(30),
            max_history: 20,
        }
    }

    pub fn from_config(provider: Arc<dyn StructuredCompletionProvider>, config: &AppConfig) -> Self {
        Self::new(provider, &config.assistant.model)
            .with_temperature(config.assistant.temperature)
            .with_max_tokens(config.assistant.max_tokens)
            .with_timeout(Duration::from_secs(config.completion.timeout_secs))
            .with_max_history(config.history.max_messages)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn is_live(&self) -> bool {
        self.provider.is_configured()
    }

    /// The request that would be sent for this turn.
    pub fn build_request(
        &self,
        system_prompt: String,
        history: &[Message],
        question: &str,
    ) -> CompletionRequest {
        let mut messages = replay_window(history, self.max_history);
        messages.push(Message::user(question));

        CompletionRequest {
            model: self.model.clone(),
            system_prompt,
            messages,
            output_schema: response_schema(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Run one completion. Always returns a payload.
    pub async fn complete(
        &self,
        system_prompt: String,
        history: &[Message],
        question: &str,
    ) -> RawCompletion {
        if !self.provider.is_configured() {
            info!(provider = self.provider.name(), "Provider not configured, using canned answer");
            return RawCompletion::canned(canned_answer_payload(), NOT_CONFIGURED_REASON);
        }

        let request = self.build_request(system_prompt, history, question);
        debug!(
            provider = self.provider.name(),
            model = %request.model,
            messages = request.messages.len(),
            prompt_chars = request.system_prompt.len(),
            "Requesting structured completion"
        );

        match tokio::time::timeout(self.timeout, self.provider.create_completion(request)).await {
            Ok(Ok(raw)) => {
                if let Some(usage) = raw.usage {
                    debug!(
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        "Completion received"
                    );
                }
                raw
            }
            Ok(Err(e)) => {
                error!(provider = self.provider.name(), error = %e, "Completion failed, using canned answer");
                RawCompletion::canned(canned_answer_payload(), e.to_string())
            }
            Err(_) => {
                error!(
                    provider = self.provider.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Completion timed out, using canned answer"
                );
                RawCompletion::canned(
                    canned_answer_payload(),
                    format!("timed out after {}s", self.timeout.as_secs()),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingProvider, ScriptedProvider, SlowProvider};
    use coursemate_core::answer::Citation;
    use coursemate_core::provider::CompletionSource;

    fn citation() -> Citation {
        Citation {
            id: 1,
            title: "AI Foundations".into(),
            url: "module1/llms.html".into(),
            section_title: None,
            relevance_score: 0.9,
        }
    }

    #[test]
    fn schema_requires_answer_and_follow_ups() {
        let schema = response_schema();
        assert_eq!(schema.name, "response_formatter");
        assert_eq!(schema.schema["required"], serde_json::json!(["answer", "followUpQuestions"]));
        assert_eq!(schema.schema["properties"]["followUpQuestions"]["maxItems"], 3);
    }

    #[test]
    fn history_precedes_question_without_metadata() {
        let invoker = CompletionInvoker::new(Arc::new(ScriptedProvider::canonical()), "m");
        let history = vec![
            Message::user("What is an LLM?"),
            Message::assistant("A language model.").with_metadata(vec!["How?".into()], vec![citation()]),
        ];
        let request = invoker.build_request("sys".into(), &history, "How are they trained?");
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].content, "What is an LLM?");
        assert!(!request.messages[1].has_metadata());
        assert_eq!(request.messages[2].role, Role::User);
        assert_eq!(request.messages[2].content, "How are they trained?");
    }

    #[test]
    fn replay_window_caps_and_starts_on_user() {
        let mut history = Vec::new();
        for i in 0..5 {
            history.push(Message::user(format!("q{i}")));
            history.push(Message::assistant(format!("a{i}")));
        }
        // last 5 = a2, q3, a3, q4, a4; leading assistant turn dropped
        let window = replay_window(&history, 5);
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].content, "q3");
        assert_eq!(replay_window(&history, 100).len(), 10);
    }

    #[tokio::test]
    async fn live_payload_is_passed_through() {
        let provider = Arc::new(ScriptedProvider::canonical());
        let invoker = CompletionInvoker::new(provider.clone(), "m");
        let raw = invoker.complete("sys".into(), &[], "q").await;
        assert_eq!(raw.source, CompletionSource::Live);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn provider_error_becomes_canned() {
        let invoker = CompletionInvoker::new(Arc::new(FailingProvider), "m");
        let raw = invoker.complete("sys".into(), &[], "q").await;
        assert!(raw.is_canned());
        assert_eq!(raw.payload, canned_answer_payload());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_becomes_canned() {
        let invoker = CompletionInvoker::new(Arc::new(SlowProvider), "m")
            .with_timeout(Duration::from_secs(5));
        let raw = invoker.complete("sys".into(), &[], "q").await;
        match raw.source {
            CompletionSource::Canned { reason } => assert!(reason.contains("timed out")),
            CompletionSource::Live => panic!("expected canned"),
        }
    }

    #[tokio::test]
    async fn unconfigured_provider_is_not_called() {
        let provider = Arc::new(ScriptedProvider::canonical().unconfigured());
        let invoker = CompletionInvoker::new(provider.clone(), "m");
        let raw = invoker.complete("sys".into(), &[], "q").await;
        assert!(raw.is_canned());
        assert_eq!(provider.call_count(), 0);
        assert!(!invoker.is_live());
    }
}
