use crate::llm::common::{build_json_messages, build_openai_messages, extract_openai_response};
use crate::llm::http_utils::{create_http_client, send_json_request};
use crate::llm::{LlmError, LlmProvider, Message};
use async_openai::{config::OpenAIConfig, types::chat::CreateChatCompletionRequestArgs, Client};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use tracing::debug;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// LLM provider implementation for `OpenAI`
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    http_client: HttpClient,
    api_key: String,
}

impl OpenAiProvider {
    /// Create a new `OpenAI` provider instance
    #[must_use]
    pub fn new(api_key: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key.clone())
            .with_api_base(OPENAI_API_BASE);
        Self {
            client: Client::with_config(config),
            http_client: create_http_client(),
            api_key,
        }
    }
}

/// Strict `json_schema` response format wrapping `schema`
#[must_use]
pub fn json_schema_response_format(schema: &Value) -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "response",
            "strict": true,
            "schema": schema
        }
    })
}

/// Parse the JSON document returned in a structured chat completion
///
/// # Errors
///
/// Returns `LlmError::ApiError` when the model refused or returned no content,
/// `LlmError::JsonError` when the content is not valid JSON.
pub fn parse_structured_response(response: &Value) -> Result<Value, LlmError> {
    let message = response
        .pointer("/choices/0/message")
        .ok_or_else(|| LlmError::ApiError("Empty response".to_string()))?;

    if let Some(refusal) = message.get("refusal").and_then(Value::as_str) {
        return Err(LlmError::ApiError(format!("Model refused: {refusal}")));
    }

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| LlmError::ApiError("Empty response".to_string()))?;

    serde_json::from_str(content).map_err(|e| LlmError::JsonError(e.to_string()))
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat_completion(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
        model_id: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let messages = build_openai_messages(system_prompt, history, user_message)?;

        // Reasoning models (o1) reject `max_tokens` and custom temperatures
        let request = CreateChatCompletionRequestArgs::default()
            .model(model_id)
            .messages(messages)
            .max_completion_tokens(max_tokens)
            .build()
            .map_err(|e| LlmError::Unknown(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::ApiError(e.to_string()))?;

        extract_openai_response(&response)
    }

    async fn structured_completion(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
        model_id: &str,
        schema: &Value,
    ) -> Result<Value, LlmError> {
        let body = json!({
            "model": model_id,
            "messages": build_json_messages(system_prompt, history, user_message),
            "response_format": json_schema_response_format(schema)
        });

        debug!("OpenAI structured request for model {model_id}");
        let auth_header = format!("Bearer {}", self.api_key);
        let response = send_json_request(
            &self.http_client,
            &format!("{OPENAI_API_BASE}/chat/completions"),
            &body,
            Some(auth_header.as_str()),
            &[],
        )
        .await?;

        parse_structured_response(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_format_is_strict() {
        let schema = json!({"type": "object"});
        let format = json_schema_response_format(&schema);

        assert_eq!(format["type"], "json_schema");
        assert_eq!(format["json_schema"]["strict"], true);
        assert_eq!(format["json_schema"]["name"], "response");
        assert_eq!(format["json_schema"]["schema"], schema);
    }

    #[test]
    fn test_parse_structured_response() -> Result<(), LlmError> {
        let response = json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"city\": \"Seoul\"}", "refusal": null}}]
        });
        assert_eq!(parse_structured_response(&response)?, json!({"city": "Seoul"}));
        Ok(())
    }

    #[test]
    fn test_parse_structured_response_refusal() {
        let response = json!({
            "choices": [{"message": {"content": null, "refusal": "I can't help with that."}}]
        });
        let err = parse_structured_response(&response);
        assert!(matches!(err, Err(LlmError::ApiError(m)) if m.contains("can't help")));
    }

    #[test]
    fn test_parse_structured_response_bad_json() {
        let response = json!({"choices": [{"message": {"content": "not json"}}]});
        assert!(matches!(
            parse_structured_response(&response),
            Err(LlmError::JsonError(_))
        ));
    }
}
