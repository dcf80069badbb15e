//! Routing through `LlmClient` with in-process providers.

use async_trait::async_trait;
use oxide_relay::config::{structured_models, Provider};
use oxide_relay::llm::{LlmClient, LlmError, LlmProvider, Message};
use oxide_relay::schema::{build_properties_schema, parse_property_names};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

type CallLog = Arc<Mutex<Vec<String>>>;

/// Answers with its own name and the model, fills every schema property
struct EchoProvider {
    name: &'static str,
    calls: CallLog,
}

impl EchoProvider {
    fn boxed(name: &'static str, calls: &CallLog) -> Option<Box<dyn LlmProvider>> {
        Some(Box::new(Self {
            name,
            calls: Arc::clone(calls),
        }))
    }

    fn record(&self, model_id: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("{}:{model_id}", self.name));
        }
    }
}

#[async_trait]
impl LlmProvider for EchoProvider {
    async fn chat_completion(
        &self,
        _system_prompt: &str,
        _history: &[Message],
        user_message: &str,
        model_id: &str,
        _max_tokens: u32,
    ) -> Result<String, LlmError> {
        self.record(model_id);
        Ok(format!("{} [{model_id}]: {user_message}", self.name))
    }

    async fn structured_completion(
        &self,
        _system_prompt: &str,
        _history: &[Message],
        _user_message: &str,
        model_id: &str,
        schema: &Value,
    ) -> Result<Value, LlmError> {
        self.record(model_id);
        let object: Map<String, Value> = schema["required"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(|name| (name.to_string(), json!(format!("{name} value"))))
            .collect();
        Ok(Value::Object(object))
    }
}

fn client(calls: &CallLog) -> LlmClient {
    LlmClient::with_providers(
        EchoProvider::boxed("anthropic", calls),
        EchoProvider::boxed("openai", calls),
        String::new(),
    )
}

fn recorded(calls: &CallLog) -> Vec<String> {
    calls.lock().map(|c| c.clone()).unwrap_or_default()
}

#[tokio::test]
async fn plain_requests_follow_the_catalog() -> Result<(), LlmError> {
    let calls = CallLog::default();
    let client = client(&calls);

    assert_eq!(
        client.chat("hi", None).await?,
        "anthropic [claude-sonnet-4-5]: hi"
    );
    assert_eq!(
        client.chat("hi", Some("claude-haiku-4-5")).await?,
        "anthropic [claude-haiku-4-5]: hi"
    );
    assert_eq!(client.chat("hi", Some("o1")).await?, "openai [o1]: hi");

    assert_eq!(
        recorded(&calls),
        vec!["anthropic:claude-sonnet-4-5", "anthropic:claude-haiku-4-5", "openai:o1"]
    );
    Ok(())
}

#[tokio::test]
async fn structured_requests_go_to_openai() -> Result<(), Box<dyn std::error::Error>> {
    let calls = CallLog::default();
    let client = client(&calls);

    let names = parse_property_names("title, author")?;
    let schema = build_properties_schema(&names);

    for model in structured_models() {
        let value = client.structured("a novel", &schema, Some(model)).await?;
        assert_eq!(value["title"], "title value");
        assert_eq!(value["author"], "author value");
    }

    let value = client.structured("a novel", &schema, None).await?;
    assert_eq!(value["title"], "title value");

    assert!(recorded(&calls).iter().all(|c| c.starts_with("openai:")));
    assert_eq!(recorded(&calls).last().map(String::as_str), Some("openai:gpt-4o"));
    Ok(())
}

#[tokio::test]
async fn rejected_requests_never_reach_a_provider() {
    let calls = CallLog::default();
    let client = client(&calls);
    let schema = build_properties_schema(&["x".to_string()]);

    assert!(matches!(
        client.structured("p", &schema, Some("claude-sonnet-4-5")).await,
        Err(LlmError::StructuredUnsupported(_))
    ));
    assert!(matches!(
        client.chat("p", Some("gpt-5-turbo")).await,
        Err(LlmError::UnknownModel(m)) if m == "gpt-5-turbo"
    ));
    assert!(recorded(&calls).is_empty());
}

#[tokio::test]
async fn unconfigured_provider_is_reported() {
    let calls = CallLog::default();
    let client = LlmClient::with_providers(
        EchoProvider::boxed("anthropic", &calls),
        None,
        String::new(),
    );

    assert!(client.is_available(Provider::Anthropic));
    assert!(!client.is_available(Provider::OpenAi));
    assert!(matches!(
        client.chat("p", Some("gpt-4o")).await,
        Err(LlmError::MissingConfig(p)) if p == "openai"
    ));
}
