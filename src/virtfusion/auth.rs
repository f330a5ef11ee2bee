//! VirtFusion Authentication
//!
//! VirtFusion uses a static bearer token issued from the admin panel. This
//! module holds the token and the environment variable names the provider
//! reads its connection settings from.

use std::fmt;

pub const ENV_ENDPOINT: &str = "VIRTFUSION_ENDPOINT";
pub const ENV_API_TOKEN: &str = "VIRTFUSION_API_TOKEN";

/// API credentials
#[derive(Clone)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    /// Wrap a token. Returns `None` if the token is not usable as a bearer value.
    pub fn new(token: &str) -> Option<Self> {
        let token = token.trim();
        validate_token(token).then(|| Self {
            token: token.to_string(),
        })
    }

    /// Bearer token for the `Authorization` header
    pub fn token(&self) -> &str {
        &self.token
    }
}

// Security: never print the token itself
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &format_args!("<{} chars redacted>", self.token.len()))
            .finish()
    }
}

/// A token must be non-empty printable ASCII without whitespace
pub fn validate_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_graphic())
}

/// Read a non-empty environment variable
pub fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
