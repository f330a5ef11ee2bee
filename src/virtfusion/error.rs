//! Error taxonomy for VirtFusion API calls
//!
//! Remote faults keep the HTTP status and (sanitized) body for diagnostics.
//! Local faults (encoding, record shape) never reach the network.

use serde_json::Value;
use thiserror::Error;

use super::http::sanitize_for_log;

#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 422 - the caller can fix the input
    #[error("validation failed: {errors}")]
    Validation { errors: Value },

    #[error("resource not found at {path}")]
    NotFound { path: String },

    #[error("failed to send request to {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("failed to parse {context}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to encode request body")]
    Encode(#[source] serde_json::Error),

    #[error("required field `{field}` is not set")]
    MissingField { field: String },

    #[error("field `{field}` expects {expected}")]
    InvalidField { field: String, expected: &'static str },

    #[error("unknown field `{field}` for {kind}")]
    UnknownField { kind: String, field: String },

    #[error("field `{field}` cannot change after creation (requires replacement)")]
    ImmutableField { field: String },

    #[error("record has no id")]
    MissingId,

    #[error("remote id {remote} does not match record id {local}")]
    IdChanged { local: i64, remote: i64 },

    #[error("no {collection} entry named `{name}`")]
    LookupFailed { collection: String, name: String },

    #[error("{0} has not been configured")]
    NotConfigured(String),

    #[error("unknown resource kind `{0}`")]
    UnknownKind(String),
}

impl ApiError {
    /// Build the error for a non-2xx response that is not handled specially
    pub fn unexpected(status: u16, body: &str) -> Self {
        Self::UnexpectedStatus {
            status,
            body: sanitize_for_log(body),
        }
    }

    /// Build the error for a 422 response. Falls back to the raw body when
    /// there is no `errors` key.
    pub fn validation(body: &str) -> Self {
        let errors = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("errors").cloned())
            .unwrap_or_else(|| Value::String(sanitize_for_log(body)));
        Self::Validation { errors }
    }

    /// HTTP status carried by this error, if it came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Validation { .. } => Some(422),
            Self::NotFound { .. } => Some(404),
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for faults that originate on this side of the wire
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Encode(_)
                | Self::InvalidInput(_)
                | Self::MissingField { .. }
                | Self::InvalidField { .. }
                | Self::UnknownField { .. }
                | Self::ImmutableField { .. }
                | Self::MissingId
                | Self::NotConfigured(_)
                | Self::UnknownKind(_)
        )
    }
}

/// Short hint for a status code, shown next to CLI errors
pub fn status_hint(status: u16) -> Option<&'static str> {
    match status {
        401 => Some("Authentication failed. Check VIRTFUSION_API_TOKEN."),
        403 => Some("Permission denied. The API token lacks access to this resource."),
        404 => Some("Resource not found."),
        409 => Some("Resource conflict. The resource may already exist or be in use."),
        422 => Some("The server rejected the input. Fix the listed fields and retry."),
        429 => Some("Rate limit exceeded. Please try again later."),
        500 | 502 | 503 => Some("VirtFusion service temporarily unavailable. Please try again."),
        _ => None,
    }
}
