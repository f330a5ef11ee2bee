//! HTTP utilities for VirtFusion REST API calls

use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::Value;

use super::error::ApiError;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = match body.char_indices().nth(MAX_LOG_BODY_LENGTH) {
        Some((cut, _)) => format!("{}... [truncated, {} bytes total]", &body[..cut], body.len()),
        None => body.to_string(),
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// Raw response: status plus body text. Status interpretation is left to the
/// caller, since 404 and 422 mean different things per operation.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON. An empty body parses as `null`.
    pub fn json(&self) -> Result<Value, ApiError> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body).map_err(|source| ApiError::Decode {
            context: format!("response body (status {})", self.status),
            source,
        })
    }
}

/// HTTP client wrapper for VirtFusion API calls
#[derive(Clone, Debug)]
pub struct VirtFusionHttpClient {
    client: Client,
}

impl VirtFusionHttpClient {
    /// Create a new HTTP client
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("virtfusion-provider/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|source| ApiError::Transport {
                url: String::new(),
                source,
            })?;

        Ok(Self { client })
    }

    /// Send one request and return the raw response
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json");

        if let Some(body) = body {
            // Encode faults must not surface as transport faults
            let payload = serde_json::to_vec(body).map_err(ApiError::Encode)?;
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(payload);
        }

        let response = request.send().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;

        let response = ApiResponse { status, body };
        if !response.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} {} - {}", method, status, sanitize_for_log(&response.body));
        }

        Ok(response)
    }

    pub async fn get(&self, url: &str, token: &str) -> Result<ApiResponse, ApiError> {
        self.send(Method::GET, url, token, None).await
    }

    pub async fn post(&self, url: &str, token: &str, body: &Value) -> Result<ApiResponse, ApiError> {
        self.send(Method::POST, url, token, Some(body)).await
    }

    pub async fn delete(&self, url: &str, token: &str) -> Result<ApiResponse, ApiError> {
        self.send(Method::DELETE, url, token, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.starts_with(&"x".repeat(MAX_LOG_BODY_LENGTH)));
        assert!(sanitized.contains("500 bytes total"));
    }

    #[test]
    fn test_sanitize_handles_multibyte_boundary() {
        let body = "é".repeat(300);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.contains("truncated"));
    }

    #[test]
    fn test_sanitize_strips_control_chars() {
        assert_eq!(sanitize_for_log("a\nb\tc"), "abc");
    }

    #[test]
    fn test_empty_body_parses_as_null() {
        let response = ApiResponse { status: 204, body: String::new() };
        assert!(response.is_success());
        assert_eq!(response.json().unwrap(), Value::Null);
    }
}
