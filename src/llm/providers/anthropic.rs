use crate::llm::http_utils::{create_http_client, send_json_request};
use crate::llm::{LlmError, LlmProvider, Message};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};

const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// LLM provider implementation for Anthropic Claude
pub struct AnthropicProvider {
    http_client: HttpClient,
    api_key: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider instance
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            http_client: create_http_client(),
            api_key,
        }
    }
}

/// Build a Messages API request body. The system prompt is a top-level field.
#[must_use]
pub fn build_request_body(
    system_prompt: &str,
    history: &[Message],
    user_message: &str,
    model_id: &str,
    max_tokens: u32,
) -> Value {
    let mut messages: Vec<Value> = history
        .iter()
        .filter(|m| m.role != "system")
        .map(|m| {
            let role = if m.role == "user" { "user" } else { "assistant" };
            json!({"role": role, "content": m.content})
        })
        .collect();
    messages.push(json!({"role": "user", "content": user_message}));

    let mut body = json!({
        "model": model_id,
        "max_tokens": max_tokens,
        "messages": messages
    });
    if !system_prompt.is_empty() {
        body["system"] = json!(system_prompt);
    }
    body
}

/// Extract the first text block of a Messages API response
///
/// # Errors
///
/// Returns `LlmError::ApiError` when the response carries no text block.
pub fn extract_text(response: &Value) -> Result<String, LlmError> {
    response
        .get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        })
        .and_then(|b| b.get("text"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| LlmError::ApiError("Empty response".to_string()))
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat_completion(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
        model_id: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let body = build_request_body(system_prompt, history, user_message, model_id, max_tokens);

        let response = send_json_request(
            &self.http_client,
            ANTHROPIC_MESSAGES_URL,
            &body,
            None,
            &[
                ("x-api-key", self.api_key.as_str()),
                ("anthropic-version", ANTHROPIC_VERSION),
            ],
        )
        .await?;

        extract_text(&response)
    }

    async fn structured_completion(
        &self,
        _system_prompt: &str,
        _history: &[Message],
        _user_message: &str,
        model_id: &str,
        _schema: &Value,
    ) -> Result<Value, LlmError> {
        Err(LlmError::StructuredUnsupported(model_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_without_system() {
        let body = build_request_body("", &[], "hello", "claude-haiku-4-5", 8192);

        assert!(body.get("system").is_none());
        assert_eq!(body["max_tokens"], 8192);
        assert_eq!(body["messages"], json!([{"role": "user", "content": "hello"}]));
    }

    #[test]
    fn test_request_body_with_system_and_history() {
        let history = vec![Message::user("q"), Message::assistant("a")];
        let body = build_request_body("be nice", &history, "next", "claude-sonnet-4-5", 100);

        assert_eq!(body["system"], "be nice");
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(3));
        assert_eq!(body["messages"][1]["role"], "assistant");
    }

    #[test]
    fn test_extract_text_skips_non_text_blocks() -> Result<(), LlmError> {
        let response = json!({
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "Answer"}
            ]
        });
        assert_eq!(extract_text(&response)?, "Answer");
        Ok(())
    }

    #[test]
    fn test_extract_text_empty() {
        assert!(extract_text(&json!({"content": []})).is_err());
    }
}
