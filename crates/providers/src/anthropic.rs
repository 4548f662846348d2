//! Structured completions over the Anthropic Messages API.
//!
//! The answer schema is offered as the only tool and forced with
//! `tool_choice: {"type": "tool"}`; the tool input found in the reply is the
//! payload. Auth is the `x-api-key` header plus a pinned `anthropic-version`,
//! and the system prompt travels as its own top-level field.

use async_trait::async_trait;
use coursemate_core::error::ProviderError;
use coursemate_core::message::Message;
use coursemate_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: crate::http_client(),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert history to Anthropic messages. Display metadata never leaves
    /// the process; only role and content are sent.
    fn to_api_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
        messages
            .iter()
            .map(|m| AnthropicMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    fn to_api_tool(schema: &OutputSchema) -> AnthropicTool {
        AnthropicTool {
            name: schema.name.clone(),
            description: schema.description.clone(),
            input_schema: schema.schema.clone(),
        }
    }

    /// Build the request body with the output tool forced.
    fn request_body(request: &CompletionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": request.model,
            "system": request.system_prompt,
            "messages": Self::to_api_messages(&request.messages),
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "tools": [Self::to_api_tool(&request.output_schema)],
            "tool_choice": {"type": "tool", "name": request.output_schema.name},
        })
    }

    /// Pull the forced tool input out of a response envelope.
    ///
    /// When the envelope has the expected `tool_use` block its `input` becomes
    /// the payload. Anything else is handed on whole so the normalizer can
    /// try its remaining strategies.
    fn extract_payload(envelope: serde_json::Value, tool_name: &str) -> RawCompletion {
        let parsed: Option<AnthropicResponse> = serde_json::from_value(envelope.clone()).ok();

        let Some(response) = parsed else {
            warn!("Anthropic response did not match the Messages API shape");
            return RawCompletion::live(envelope, "unknown", None);
        };

        let usage = Some(Usage {
            prompt_tokens: response.usage.input_tokens,
            completion_tokens: response.usage.output_tokens,
            total_tokens: response.usage.input_tokens + response.usage.output_tokens,
        });

        let tool_input = response.content.into_iter().find_map(|block| match block {
            ResponseContentBlock::ToolUse { name, input, .. } if name == tool_name => Some(input),
            _ => None,
        });

        match tool_input {
            Some(input) => RawCompletion::live(input, response.model, usage),
            None => {
                debug!(
                    stop_reason = ?response.stop_reason,
                    "No '{tool_name}' tool_use block, passing envelope through"
                );
                RawCompletion::live(envelope, response.model, usage)
            }
        }
    }
}

#[async_trait]
impl StructuredCompletionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_completion(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<RawCompletion, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = Self::request_body(&request);

        debug!(provider = "anthropic", model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid Anthropic API key".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Anthropic API error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let envelope: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse Anthropic response: {e}")))?;

        Ok(Self::extract_payload(envelope, &request.output_schema.name))
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        // Try a minimal request to verify the API key
        let url = format!("{}/v1/messages", self.base_url);
        let body = serde_json::json!({
            "model": "claude-3-5-haiku-latest",
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 1,
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        // 401 = bad key; anything else means the service is reachable
        Ok(response.status().as_u16() != 401)
    }
}

// --- Anthropic API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ResponseContentBlock>,
    usage: AnthropicUsage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text {
        #[allow(dead_code)]
        text: String,
    },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[allow(dead_code)]
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "claude-3-5-haiku-latest".into(),
            system_prompt: "You are an AI assistant for the AI Education course.".into(),
            messages: vec![
                Message::user("What is an LLM?"),
                Message::assistant("A language model.")
                    .with_metadata(vec!["How?".into()], Vec::new()),
                Message::user("How are they trained?"),
            ],
            output_schema: OutputSchema {
                name: "response_formatter".into(),
                description: "Format the answer".into(),
                schema: json!({"type": "object"}),
            },
            temperature: 0.3,
            max_tokens: 1000,
        }
    }

    #[test]
    fn constructor() {
        let provider = AnthropicProvider::new("sk-ant-test");
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn constructor_with_base_url() {
        let provider =
            AnthropicProvider::new("sk-ant-test").with_base_url("https://custom.proxy.com/");
        assert_eq!(provider.base_url, "https://custom.proxy.com");
    }

    #[test]
    fn body_forces_output_tool() {
        let body = AnthropicProvider::request_body(&request());
        assert_eq!(body["tool_choice"], json!({"type": "tool", "name": "response_formatter"}));
        assert_eq!(body["tools"][0]["name"], "response_formatter");
        assert_eq!(body["tools"][0]["input_schema"], json!({"type": "object"}));
        assert_eq!(body["max_tokens"], 1000);
        assert!(body["system"].as_str().unwrap().contains("AI Education"));
    }

    #[test]
    fn body_messages_carry_role_and_content_only() {
        let body = AnthropicProvider::request_body(&request());
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], json!({"role": "assistant", "content": "A language model."}));
    }

    #[test]
    fn extracts_matching_tool_input() {
        let envelope = json!({
            "id": "msg_1",
            "model": "claude-3-5-haiku-latest",
            "content": [
                {"type": "text", "text": "Let me format that."},
                {"type": "tool_use", "id": "toolu_1", "name": "response_formatter",
                 "input": {"answer": {"text": "Hi"}, "followUpQuestions": ["Q"]}}
            ],
            "usage": {"input_tokens": 100, "output_tokens": 20},
            "stop_reason": "tool_use"
        });
        let raw = AnthropicProvider::extract_payload(envelope, "response_formatter");
        assert_eq!(raw.payload["answer"]["text"], "Hi");
        assert_eq!(raw.model, "claude-3-5-haiku-latest");
        assert_eq!(raw.usage.unwrap().total_tokens, 120);
        assert!(!raw.is_canned());
    }

    #[test]
    fn text_only_response_passes_envelope_through() {
        let envelope = json!({
            "id": "msg_2",
            "model": "claude-3-5-haiku-latest",
            "content": [{"type": "text", "text": "\"text\": \"Plain answer\""}],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        });
        let raw = AnthropicProvider::extract_payload(envelope.clone(), "response_formatter");
        assert_eq!(raw.payload, envelope);
    }

    #[test]
    fn unrelated_block_types_are_tolerated() {
        let envelope = json!({
            "id": "msg_3",
            "model": "m",
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "tool_use", "id": "t", "name": "response_formatter", "input": {"x": 1}}
            ],
            "usage": {"input_tokens": 1, "output_tokens": 1}
        });
        let raw = AnthropicProvider::extract_payload(envelope, "response_formatter");
        assert_eq!(raw.payload, json!({"x": 1}));
    }

    #[test]
    fn unknown_shape_passes_through() {
        let raw = AnthropicProvider::extract_payload(json!("just a string"), "response_formatter");
        assert_eq!(raw.payload, json!("just a string"));
        assert_eq!(raw.model, "unknown");
    }
}
