//! HTTP utilities for LLM providers
//!
//! Provides common HTTP request/response handling shared by the providers
//! that talk to their APIs without a dedicated SDK.

use crate::config::get_llm_http_timeout_secs;
use crate::llm::LlmError;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;

/// Maximum length of an error body kept in `LlmError::ApiError`
const MAX_ERROR_BODY_LEN: usize = 500;

/// Creates an HTTP client configured with the standard LLM timeout.
///
/// Uses `LLM_HTTP_TIMEOUT_SECS` environment variable or the 120s default.
#[must_use]
pub fn create_http_client() -> HttpClient {
    create_http_client_with_timeout(get_llm_http_timeout_secs())
}

/// Creates an HTTP client with an explicit timeout in seconds.
#[must_use]
pub fn create_http_client_with_timeout(timeout_secs: u64) -> HttpClient {
    HttpClient::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// Sends an HTTP POST request with JSON body and returns parsed JSON response.
///
/// # Arguments
/// * `client` - HTTP client to use
/// * `url` - Target URL
/// * `body` - JSON body to send
/// * `auth_header` - Optional authorization header value (e.g., "Bearer token")
/// * `extra_headers` - Additional headers as key-value pairs
///
/// # Errors
///
/// Returns `LlmError::NetworkError` on connectivity issues, `LlmError::ApiError` on non-success status codes,
/// or `LlmError::JsonError` if parsing fails.
pub async fn send_json_request(
    client: &HttpClient,
    url: &str,
    body: &Value,
    auth_header: Option<&str>,
    extra_headers: &[(&str, &str)],
) -> Result<Value, LlmError> {
    let mut request = client.post(url).json(body);

    if let Some(auth) = auth_header {
        request = request.header("Authorization", auth);
    }

    for (key, value) in extra_headers {
        request = request.header(*key, *value);
    }

    let response = request
        .send()
        .await
        .map_err(|e| LlmError::NetworkError(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(LlmError::ApiError(describe_error_body(
            &status.to_string(),
            error_text,
        )));
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::JsonError(e.to_string()))
}

/// Turns a failed response body into a short, readable message.
///
/// HTML error pages from proxies are dropped and long bodies truncated.
#[must_use]
pub fn describe_error_body(status: &str, error_text: String) -> String {
    let trimmed = error_text.trim_start();
    let is_html = trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML");

    if is_html {
        return format!("{status} (Server returned HTML error page)");
    }

    if error_text.chars().count() > MAX_ERROR_BODY_LEN {
        let truncated = crate::utils::truncate_str(&error_text, MAX_ERROR_BODY_LEN);
        format!("{status} - {truncated}... (truncated)")
    } else {
        format!("{status} - {error_text}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_describe_error_body_html() {
        let msg = describe_error_body("502 Bad Gateway", "<html><body>nginx</body></html>".into());
        assert_eq!(msg, "502 Bad Gateway (Server returned HTML error page)");
    }

    #[test]
    fn test_describe_error_body_truncates() {
        let msg = describe_error_body("400", "x".repeat(2000));
        assert!(msg.ends_with("... (truncated)"));
        assert!(msg.len() < 600);
    }
}
