//! End-to-end integration tests for Coursemate.
//!
//! These tests exercise the full path from a question to a structured answer:
//! retrieval over the built-in course index, prompt composition, the forced
//! structured completion, normalization, citations, and the HTTP surface.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use coursemate_assistant::{AnswerPipeline, AnswerRequest, ConversationState};
use coursemate_config::AppConfig;
use coursemate_core::error::{InputError, ProviderError};
use coursemate_core::message::Role;
use coursemate_core::proficiency::ProficiencyLevel;
use coursemate_core::provider::{CompletionRequest, RawCompletion, StructuredCompletionProvider};
use coursemate_gateway::{GatewayState, build_router};
use coursemate_retrieval::{InMemoryStore, RetrievalClient, StoreMode};
use http_body_util::BodyExt;
use tower::ServiceExt;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Returns scripted payloads in sequence and records every request.
struct ScriptedProvider {
    payloads: Vec<serde_json::Value>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    fn new(payloads: Vec<serde_json::Value>) -> Self {
        Self {
            payloads,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, n: usize) -> CompletionRequest {
        self.requests.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl StructuredCompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn create_completion(&self, request: CompletionRequest) -> Result<RawCompletion, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let n = requests.len();
        assert!(
            n < self.payloads.len(),
            "ScriptedProvider exhausted: call #{n}, have {}",
            self.payloads.len()
        );
        requests.push(request);
        Ok(RawCompletion::live(self.payloads[n].clone(), "e2e-model", None))
    }
}

struct DownProvider;

#[async_trait]
impl StructuredCompletionProvider for DownProvider {
    fn name(&self) -> &str {
        "down"
    }

    async fn create_completion(&self, _request: CompletionRequest) -> Result<RawCompletion, ProviderError> {
        Err(ProviderError::Network("connection reset".into()))
    }
}

fn payload(text: &str, summary: &str) -> serde_json::Value {
    serde_json::json!({
        "answer": {"text": text},
        "followUpQuestions": ["What is attention?", "How are transformers trained?"],
        "conversationSummary": summary
    })
}

fn pipeline(provider: Arc<dyn StructuredCompletionProvider>) -> AnswerPipeline {
    let config = AppConfig::default();
    let retrieval = Arc::new(RetrievalClient::new(
        Arc::new(InMemoryStore::course_index()),
        StoreMode::Fallback,
    ));
    AnswerPipeline::from_config(&config, provider, retrieval)
}

// ── Pipeline ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_question_grounded_in_course_index() {
    let provider = Arc::new(ScriptedProvider::new(vec![payload(
        "A transformer processes tokens in parallel using attention.",
        "Introduced transformers.",
    )]));
    let pipeline = pipeline(provider.clone());

    let mut request = AnswerRequest::new("What is a transformer?");
    request.proficiency_level = Some("Beginner".into());
    let answer = pipeline.answer_question(request).await.unwrap();

    assert_eq!(answer.answer_text, "A transformer processes tokens in parallel using attention.");
    assert_eq!(answer.follow_up_questions.len(), 2);
    assert_eq!(answer.conversation_summary.as_deref(), Some("Introduced transformers."));

    // Only the matching course page is cited
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].url, "module2/transformers.html");
    assert_eq!(answer.sources[0].id, 1);

    let sent = provider.request(0);
    assert!(sent.system_prompt.contains("The user's current proficiency level is: Beginner"));
    assert!(sent.system_prompt.contains("module2/transformers.html"));
    assert!(!sent.system_prompt.contains("module1/llms.html"));
    assert_eq!(sent.output_schema.name, "response_formatter");
    assert_eq!(sent.messages.len(), 1);
    assert_eq!(sent.messages[0].content, "What is a transformer?");
}

#[tokio::test]
async fn e2e_multi_turn_conversation_carries_state() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        payload("LLMs are trained on large text corpora.", "Discussed LLMs."),
        payload("Temperature controls randomness.", "Discussed LLMs and temperature."),
    ]));
    let pipeline = pipeline(provider.clone());
    let mut state = ConversationState::new(ProficiencyLevel::Intermediate);

    pipeline.answer_turn(&mut state, "What are LLMs?").await.unwrap();
    state.set_proficiency(ProficiencyLevel::Expert);
    let second = pipeline
        .answer_turn(&mut state, "What does temperature do?")
        .await
        .unwrap();

    assert_eq!(second.answer_text, "Temperature controls randomness.");
    assert_eq!(state.history().len(), 4);
    assert_eq!(state.summary(), Some("Discussed LLMs and temperature."));

    let sent = provider.request(1);
    assert!(sent.system_prompt.contains("CONVERSATION CONTEXT:\nDiscussed LLMs."));
    assert!(sent.system_prompt.contains("The user's current proficiency level is: Expert"));

    let roles: Vec<Role> = sent.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
    assert_eq!(sent.messages[1].content, "LLMs are trained on large text corpora.");
    assert!(sent.messages.iter().all(|m| !m.has_metadata()));
}

#[tokio::test]
async fn e2e_unusable_payload_still_answers() {
    let provider = Arc::new(ScriptedProvider::new(vec![serde_json::json!({"unexpected": true})]));
    let pipeline = pipeline(provider.clone());

    let answer = pipeline
        .answer_question(AnswerRequest::new("What is machine learning?"))
        .await
        .unwrap();

    assert!(!answer.answer_text.trim().is_empty());
    assert_eq!(answer.follow_up_questions.len(), 3);
    assert!(answer.sources.is_empty());
}

#[tokio::test]
async fn e2e_provider_outage_uses_canned_answer() {
    let pipeline = pipeline(Arc::new(DownProvider));

    let answer = pipeline
        .answer_question(AnswerRequest::new("What are LLMs?"))
        .await
        .unwrap();

    assert!(answer.answer_text.contains("Large Language Models"));
    assert_eq!(answer.follow_up_questions.len(), 3);
}

#[tokio::test]
async fn e2e_empty_question_never_reaches_provider() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let pipeline = pipeline(provider.clone());

    let err = pipeline.answer_question(AnswerRequest::new("   ")).await.unwrap_err();
    assert_eq!(err, InputError::MissingMessage);
    assert_eq!(provider.calls(), 0);
}

// ── Config ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_config_file_drives_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[assistant]
course_name = "Intro to ML"
provider = "anthropic"

[retrieval]
backend = "memory"
top_k = 2
"#,
    )
    .unwrap();

    let config = AppConfig::load_from(&path).unwrap();
    let pipeline = AnswerPipeline::connect(&config).await;

    assert_eq!(pipeline.course_name(), "Intro to ML");
    assert_eq!(pipeline.store_mode(), StoreMode::Fallback);
    assert_eq!(pipeline.retrieval().top_k(), 2);
    // No key in the file: the assistant still answers, with the canned reply
    assert!(!pipeline.is_live());

    let answer = pipeline
        .answer_question(AnswerRequest::new("What are LLMs?"))
        .await
        .unwrap();
    assert!(answer.answer_text.contains("Large Language Models"));
}

// ── HTTP ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_http_chat_forwards_widget_state() {
    let provider = Arc::new(ScriptedProvider::new(vec![payload(
        "Attention weighs tokens against each other.",
        "Discussed attention.",
    )]));
    let state = Arc::new(GatewayState {
        pipeline: Arc::new(pipeline(provider.clone())),
    });
    let app = build_router(state, &AppConfig::default().gateway);

    let body = serde_json::json!({
        "message": "How does attention work in a transformer?",
        "conversationHistory": [
            {"role": "user", "content": "What is a transformer?"},
            {"role": "bot", "content": "A neural network architecture."}
        ],
        "proficiencyLevel": "expert",
        "conversationSummary": "Discussed transformers."
    });
    let req = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["answer"]["text"], "Attention weighs tokens against each other.");
    assert_eq!(json["conversationSummary"], "Discussed attention.");
    assert_eq!(json["sources"][0]["url"], "module2/transformers.html");

    let sent = provider.request(0);
    assert_eq!(sent.messages.len(), 3);
    assert_eq!(sent.messages[1].role, Role::Assistant);
    assert!(sent.system_prompt.contains("Discussed transformers."));
    assert!(sent.system_prompt.contains("The user's current proficiency level is: Expert"));
}
