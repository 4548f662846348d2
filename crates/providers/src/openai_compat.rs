//! OpenAI-compatible provider.
//!
//! Works with any service exposing `/chat/completions` with function calling
//! (OpenAI itself, Azure-style proxies, OpenRouter, local servers).
//! The output schema is sent as the only function and forced via
//! `tool_choice`.

use async_trait::async_trait;
use coursemate_core::error::ProviderError;
use coursemate_core::message::Message;
use coursemate_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A provider speaking the OpenAI chat completions protocol.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: crate::http_client(),
        }
    }

    /// OpenAI's hosted API.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// System prompt first, then history as role/content pairs.
    fn to_api_messages(system_prompt: &str, messages: &[Message]) -> Vec<ApiMessage> {
        std::iter::once(ApiMessage {
            role: "system".into(),
            content: Some(system_prompt.to_string()),
            tool_calls: None,
        })
        .chain(messages.iter().map(|m| ApiMessage {
            role: m.role.as_str().to_string(),
            content: Some(m.content.clone()),
            tool_calls: None,
        }))
        .collect()
    }

    fn to_api_tool(schema: &OutputSchema) -> ApiToolDefinition {
        ApiToolDefinition {
            r#type: "function".into(),
            function: ApiToolFunction {
                name: schema.name.clone(),
                description: schema.description.clone(),
                parameters: schema.schema.clone(),
            },
        }
    }

    fn request_body(request: &CompletionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.system_prompt, &request.messages),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": false,
            "tools": [Self::to_api_tool(&request.output_schema)],
            "tool_choice": {"type": "function", "function": {"name": request.output_schema.name}},
        })
    }

    /// Function arguments arrive as a JSON-encoded string. It is passed on
    /// undecoded; the normalizer owns string decoding. A response without the
    /// expected call is passed on whole, with the message text when present.
    fn extract_payload(envelope: serde_json::Value, tool_name: &str) -> RawCompletion {
        let parsed: Option<ApiResponse> = serde_json::from_value(envelope.clone()).ok();

        let Some(response) = parsed else {
            warn!("Chat completion response did not match the expected shape");
            return RawCompletion::live(envelope, "unknown", None);
        };

        let usage = response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        let Some(choice) = response.choices.into_iter().next() else {
            return RawCompletion::live(envelope, response.model, usage);
        };

        let arguments = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .find(|tc| tc.function.name == tool_name)
            .map(|tc| tc.function.arguments);

        match (arguments, choice.message.content) {
            (Some(args), _) => {
                RawCompletion::live(serde_json::Value::String(args), response.model, usage)
            }
            (None, Some(text)) if !text.trim().is_empty() => {
                debug!("No '{tool_name}' function call, using message text");
                RawCompletion::live(serde_json::Value::String(text), response.model, usage)
            }
            (None, _) => RawCompletion::live(envelope, response.model, usage),
        }
    }
}

#[async_trait]
impl StructuredCompletionProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_completion(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<RawCompletion, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let envelope: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        Ok(Self::extract_payload(envelope, &request.output_schema.name))
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "gpt-4o-mini".into(),
            system_prompt: "persona".into(),
            messages: vec![Message::user("What is attention?")],
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
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai("sk-test");
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn trailing_slash_trimmed() {
        let provider = OpenAiCompatProvider::new("proxy", "http://localhost:8080/v1/", "k");
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn body_puts_system_first_and_forces_function() {
        let body = OpenAiCompatProvider::request_body(&request());
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0], json!({"role": "system", "content": "persona"}));
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "response_formatter");
        assert_eq!(
            body["tool_choice"],
            json!({"type": "function", "function": {"name": "response_formatter"}})
        );
    }

    #[test]
    fn function_arguments_pass_through_as_string() {
        let envelope = json!({
            "model": "gpt-4o-mini",
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{"id": "call_1", "type": "function", "function": {
                    "name": "response_formatter",
                    "arguments": "{\"answer\":{\"text\":\"Hi\"},\"followUpQuestions\":[\"Q\"]}"
                }}]
            }}],
            "usage": {"prompt_tokens": 50, "completion_tokens": 10, "total_tokens": 60}
        });
        let raw = OpenAiCompatProvider::extract_payload(envelope, "response_formatter");
        assert!(raw.payload.is_string());
        assert!(raw.payload.as_str().unwrap().contains("followUpQuestions"));
        assert_eq!(raw.usage.unwrap().total_tokens, 60);
    }

    #[test]
    fn plain_content_used_when_no_call() {
        let envelope = json!({
            "model": "gpt-4o-mini",
            "choices": [{"message": {"role": "assistant", "content": "Just text"}}]
        });
        let raw = OpenAiCompatProvider::extract_payload(envelope, "response_formatter");
        assert_eq!(raw.payload, json!("Just text"));
    }

    #[test]
    fn empty_choices_pass_envelope() {
        let envelope = json!({"model": "m", "choices": []});
        let raw = OpenAiCompatProvider::extract_payload(envelope.clone(), "response_formatter");
        assert_eq!(raw.payload, envelope);
    }
}
