//! VirtFusion Client
//!
//! Main client for the VirtFusion API, combining the bearer token, the HTTP
//! layer and the base URL every path is rooted under.

use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use url::Url;

use super::auth::Credentials;
use super::error::ApiError;
use super::http::{ApiResponse, VirtFusionHttpClient};

/// Path prefix of the versioned API
pub const API_PREFIX: &[&str] = &["api", "v1"];

/// Main VirtFusion client
#[derive(Clone, Debug)]
pub struct VirtFusionClient {
    pub credentials: Credentials,
    http: VirtFusionHttpClient,
    base_url: Url,
}

impl VirtFusionClient {
    /// Create a new client for an endpoint such as `cp.example.com` or
    /// `https://cp.example.com`
    pub fn new(endpoint: &Url, credentials: Credentials, timeout: Duration) -> Result<Self, ApiError> {
        let http = VirtFusionHttpClient::new(timeout)?;

        let mut base_url = endpoint.clone();
        if let Ok(mut segments) = base_url.path_segments_mut() {
            segments.pop_if_empty().extend(API_PREFIX);
        }

        Ok(Self {
            credentials,
            http,
            base_url,
        })
    }

    /// Base URL including the API prefix
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an API URL for a relative path like `servers/12/build`
    pub fn api_url(&self, path: &str) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(path.split('/').filter(|s| !s.is_empty()));
        }
        url.to_string()
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        let url = self.api_url(path);
        self.http.get(&url, self.credentials.token()).await
    }

    /// Make a POST request with a JSON body
    pub async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, ApiError> {
        let url = self.api_url(path);
        self.http.post(&url, self.credentials.token(), body).await
    }

    /// Make a PUT or PATCH request with a JSON body
    pub async fn send_json(&self, method: Method, path: &str, body: &Value) -> Result<ApiResponse, ApiError> {
        let url = self.api_url(path);
        self.http
            .send(method, &url, self.credentials.token(), Some(body))
            .await
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        let url = self.api_url(path);
        self.http.delete(&url, self.credentials.token()).await
    }
}

/// Parse a configured endpoint. A bare host gets `https://`.
pub fn parse_endpoint(endpoint: &str) -> Result<Url, String> {
    let endpoint = endpoint.trim();
    let candidate = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    };

    let url = Url::parse(&candidate).map_err(|e| format!("invalid endpoint `{}`: {}", endpoint, e))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("endpoint `{}` must use http or https", endpoint));
    }
    if url.host_str().is_none() {
        return Err(format!("endpoint `{}` has no host", endpoint));
    }

    Ok(url)
}
