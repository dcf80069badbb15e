use super::ImageError;
use crate::config::{get_image_http_timeout_secs, Settings};
use crate::llm::http_utils::{create_http_client_with_timeout, describe_error_body};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use tracing::{debug, info};

const OPENAI_IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";

/// Client for the `OpenAI` Images API
pub struct ImageGenerator {
    http_client: HttpClient,
    api_key: Option<String>,
    model: String,
    size: String,
}

impl ImageGenerator {
    /// Create a generator from settings. Without an `OpenAI` key every
    /// request fails with `ImageError::MissingConfig`.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            http_client: create_http_client_with_timeout(get_image_http_timeout_secs()),
            api_key: settings.openai_api_key.clone(),
            model: settings.image_model.clone(),
            size: settings.image_size.clone(),
        }
    }

    /// Whether an API key is configured
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// Request body for a single image
    #[must_use]
    pub fn request_body(&self, prompt: &str) -> Value {
        let mut body = json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
            "size": self.size
        });
        // DALL-E models default to URLs; gpt-image models always return base64
        if self.model.starts_with("dall-e") {
            body["response_format"] = json!("b64_json");
        }
        body
    }

    /// Generate one image for `prompt` and return its PNG bytes
    ///
    /// # Errors
    ///
    /// Returns `ImageError::MissingConfig` without an API key, network/API
    /// errors from the request, or `ImageError::DecodeError` for malformed data.
    pub async fn generate(&self, prompt: &str) -> Result<Vec<u8>, ImageError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ImageError::MissingConfig("openai".to_string()))?;

        info!("Generating image with {} ({})", self.model, self.size);
        let response = self
            .http_client
            .post(OPENAI_IMAGES_URL)
            .bearer_auth(api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| ImageError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ImageError::ApiError(describe_error_body(
                &status.to_string(),
                error_text,
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ImageError::DecodeError(e.to_string()))?;

        let bytes = decode_image_response(&body)?;
        debug!("Image generated: {} bytes", bytes.len());
        Ok(bytes)
    }
}

/// Decode `data[0].b64_json` from an Images API response
///
/// # Errors
///
/// Returns `ImageError::DecodeError` when the field is missing or not valid base64.
pub fn decode_image_response(body: &Value) -> Result<Vec<u8>, ImageError> {
    let encoded = body
        .pointer("/data/0/b64_json")
        .and_then(Value::as_str)
        .ok_or_else(|| ImageError::DecodeError("response has no b64_json image".to_string()))?;

    BASE64
        .decode(encoded)
        .map_err(|e| ImageError::DecodeError(e.to_string()))
}
