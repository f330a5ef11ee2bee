//! Configuration Management
//!
//! Handles persistent configuration storage and resolves the effective
//! provider settings. Every value resolves as: config value, then environment
//! variable, then hard-coded default.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::resource::record::FieldValue;
use crate::virtfusion::auth::{self, Credentials};
use crate::virtfusion::client::parse_endpoint;

pub const ENV_DEFAULT_OS_TEMPLATE: &str = "VIRTFUSION_DEFAULT_OS_TEMPLATE";
pub const ENV_DEFAULT_PACKAGE_ID: &str = "VIRTFUSION_DEFAULT_PACKAGE_ID";
pub const ENV_DEFAULT_PUBLIC_IPV4: &str = "VIRTFUSION_DEFAULT_PUBLIC_IPV4";
pub const ENV_DEFAULT_PRIVATE_IPV4: &str = "VIRTFUSION_DEFAULT_PRIVATE_IPV4";
pub const ENV_DEFAULT_HYPERVISOR_GROUP_ID: &str = "VIRTFUSION_DEFAULT_HYPERVISOR_GROUP_ID";
pub const ENV_TIMEOUT_SECS: &str = "VIRTFUSION_TIMEOUT_SECS";

const DEFAULT_PUBLIC_IPV4: i64 = 1;
const DEFAULT_PRIVATE_IPV4: i64 = 0;
const DEFAULT_HYPERVISOR_GROUP_ID: i64 = 1;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Control panel host or URL
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default)]
    pub default_os_template: Option<String>,
    #[serde(default)]
    pub default_package_id: Option<i64>,
    #[serde(default)]
    pub default_public_ipv4: Option<i64>,
    #[serde(default)]
    pub default_private_ipv4: Option<i64>,
    #[serde(default)]
    pub default_hypervisor_group_id: Option<i64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Every problem found while resolving configuration, reported together
#[derive(Debug, Error)]
#[error("invalid provider configuration:\n  - {}", .problems.join("\n  - "))]
pub struct ConfigError {
    pub problems: Vec<String>,
}

/// Defaults applied to omitted resource fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderDefaults {
    pub os_template: Option<String>,
    pub package_id: Option<i64>,
    pub public_ipv4: Option<i64>,
    pub private_ipv4: Option<i64>,
    pub hypervisor_group_id: Option<i64>,
}

impl ProviderDefaults {
    /// Look up a default by the name used in resource definitions
    pub fn get(&self, name: &str) -> Option<FieldValue> {
        match name {
            "os_template" => self.os_template.clone().map(FieldValue::Str),
            "package_id" => self.package_id.map(FieldValue::Int),
            "public_ipv4" => self.public_ipv4.map(FieldValue::Int),
            "private_ipv4" => self.private_ipv4.map(FieldValue::Int),
            "hypervisor_group_id" => self.hypervisor_group_id.map(FieldValue::Int),
            _ => None,
        }
    }
}

/// Fully resolved settings the provider is configured with
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub endpoint: Url,
    pub credentials: Credentials,
    pub timeout: Duration,
    pub defaults: ProviderDefaults,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("virtfusion").join("config.json"))
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from a file. A missing or unreadable file yields
    /// the empty configuration.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to `path`. The API token is never written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let persisted = Config {
            api_token: None,
            ..self.clone()
        };
        let content = serde_json::to_string_pretty(&persisted)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Replace our values with every value set in `overrides`
    pub fn overlay(&mut self, overrides: Config) {
        let Config {
            endpoint,
            api_token,
            default_os_template,
            default_package_id,
            default_public_ipv4,
            default_private_ipv4,
            default_hypervisor_group_id,
            timeout_secs,
        } = overrides;

        self.endpoint = endpoint.or(self.endpoint.take());
        self.api_token = api_token.or(self.api_token.take());
        self.default_os_template = default_os_template.or(self.default_os_template.take());
        self.default_package_id = default_package_id.or(self.default_package_id);
        self.default_public_ipv4 = default_public_ipv4.or(self.default_public_ipv4);
        self.default_private_ipv4 = default_private_ipv4.or(self.default_private_ipv4);
        self.default_hypervisor_group_id = default_hypervisor_group_id.or(self.default_hypervisor_group_id);
        self.timeout_secs = timeout_secs.or(self.timeout_secs);
    }

    /// Resolve against the process environment
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        self.resolve_with(auth::env_value)
    }

    /// Resolve with an explicit environment lookup
    pub fn resolve_with<F>(&self, env: F) -> Result<ResolvedConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut problems = Vec::new();

        let endpoint = match pick_string(&self.endpoint, auth::ENV_ENDPOINT, &env) {
            Some(raw) => match parse_endpoint(&raw) {
                Ok(url) => Some(url),
                Err(e) => {
                    problems.push(e);
                    None
                }
            },
            None => {
                problems.push(format!(
                    "endpoint not found in the {} environment variable or the `endpoint` setting",
                    auth::ENV_ENDPOINT
                ));
                None
            }
        };

        let credentials = match pick_string(&self.api_token, auth::ENV_API_TOKEN, &env) {
            Some(raw) => {
                let creds = Credentials::new(&raw);
                if creds.is_none() {
                    problems.push("API token contains whitespace or non-printable characters".to_string());
                }
                creds
            }
            None => {
                problems.push(format!(
                    "API token not found in the {} environment variable or the `api_token` setting",
                    auth::ENV_API_TOKEN
                ));
                None
            }
        };

        let defaults = ProviderDefaults {
            os_template: pick_string(&self.default_os_template, ENV_DEFAULT_OS_TEMPLATE, &env),
            package_id: pick_int(self.default_package_id, ENV_DEFAULT_PACKAGE_ID, &env, &mut problems),
            public_ipv4: pick_int(self.default_public_ipv4, ENV_DEFAULT_PUBLIC_IPV4, &env, &mut problems)
                .or(Some(DEFAULT_PUBLIC_IPV4)),
            private_ipv4: pick_int(self.default_private_ipv4, ENV_DEFAULT_PRIVATE_IPV4, &env, &mut problems)
                .or(Some(DEFAULT_PRIVATE_IPV4)),
            hypervisor_group_id: pick_int(
                self.default_hypervisor_group_id,
                ENV_DEFAULT_HYPERVISOR_GROUP_ID,
                &env,
                &mut problems,
            )
            .or(Some(DEFAULT_HYPERVISOR_GROUP_ID)),
        };

        let timeout_secs = pick_int(self.timeout_secs.map(|t| t as i64), ENV_TIMEOUT_SECS, &env, &mut problems)
            .filter(|t| *t > 0)
            .map(|t| t as u64)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        match (endpoint, credentials) {
            (Some(endpoint), Some(credentials)) if problems.is_empty() => Ok(ResolvedConfig {
                endpoint,
                credentials,
                timeout: Duration::from_secs(timeout_secs),
                defaults,
            }),
            _ => Err(ConfigError { problems }),
        }
    }
}

/// Config value if non-empty, else the environment variable
fn pick_string<F>(value: &Option<String>, var: &str, env: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    value
        .as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| env(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()))
}

fn pick_int<F>(value: Option<i64>, var: &str, env: &F, problems: &mut Vec<String>) -> Option<i64>
where
    F: Fn(&str) -> Option<String>,
{
    if value.is_some() {
        return value;
    }
    let raw = env(var)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            problems.push(format!("{} must be an integer, got `{}`", var, raw));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_env_fills_missing_config() {
        let env = env_of(&[
            ("VIRTFUSION_ENDPOINT", "cp.example.com"),
            ("VIRTFUSION_API_TOKEN", "tok"),
            ("VIRTFUSION_DEFAULT_PACKAGE_ID", "7"),
        ]);
        let resolved = Config::default().resolve_with(env).unwrap();
        assert_eq!(resolved.endpoint.as_str(), "https://cp.example.com/");
        assert_eq!(resolved.credentials.token(), "tok");
        assert_eq!(resolved.defaults.package_id, Some(7));
    }

    #[test]
    fn test_config_takes_precedence_over_env() {
        let env = env_of(&[
            ("VIRTFUSION_ENDPOINT", "env.example.com"),
            ("VIRTFUSION_API_TOKEN", "env-token"),
            ("VIRTFUSION_DEFAULT_PUBLIC_IPV4", "4"),
        ]);
        let config = Config {
            endpoint: Some("https://cfg.example.com".to_string()),
            api_token: Some("cfg-token".to_string()),
            default_public_ipv4: Some(2),
            ..Default::default()
        };
        let resolved = config.resolve_with(env).unwrap();
        assert_eq!(resolved.endpoint.host_str(), Some("cfg.example.com"));
        assert_eq!(resolved.credentials.token(), "cfg-token");
        assert_eq!(resolved.defaults.public_ipv4, Some(2));
    }

    #[test]
    fn test_empty_config_value_falls_through_to_env() {
        let env = env_of(&[("VIRTFUSION_ENDPOINT", "env.example.com"), ("VIRTFUSION_API_TOKEN", "t")]);
        let config = Config {
            endpoint: Some("".to_string()),
            ..Default::default()
        };
        let resolved = config.resolve_with(env).unwrap();
        assert_eq!(resolved.endpoint.host_str(), Some("env.example.com"));
    }

    #[test]
    fn test_hard_defaults() {
        let env = env_of(&[("VIRTFUSION_ENDPOINT", "cp.example.com"), ("VIRTFUSION_API_TOKEN", "t")]);
        let resolved = Config::default().resolve_with(env).unwrap();
        assert_eq!(resolved.defaults.public_ipv4, Some(1));
        assert_eq!(resolved.defaults.private_ipv4, Some(0));
        assert_eq!(resolved.defaults.hypervisor_group_id, Some(1));
        assert_eq!(resolved.defaults.package_id, None);
        assert_eq!(resolved.defaults.os_template, None);
        assert_eq!(resolved.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_endpoint_and_token_reported_together() {
        let err = Config::default().resolve_with(env_of(&[])).unwrap_err();
        assert_eq!(err.problems.len(), 2);
        let message = err.to_string();
        assert!(message.contains("VIRTFUSION_ENDPOINT"));
        assert!(message.contains("VIRTFUSION_API_TOKEN"));
    }

    #[test]
    fn test_bad_integer_env_is_a_problem() {
        let env = env_of(&[
            ("VIRTFUSION_ENDPOINT", "cp.example.com"),
            ("VIRTFUSION_API_TOKEN", "t"),
            ("VIRTFUSION_DEFAULT_PACKAGE_ID", "seven"),
        ]);
        let err = Config::default().resolve_with(env).unwrap_err();
        assert!(err.to_string().contains("VIRTFUSION_DEFAULT_PACKAGE_ID"));
    }

    #[test]
    fn test_provider_default_lookup_by_name() {
        let defaults = ProviderDefaults {
            os_template: Some("debian-12".to_string()),
            package_id: Some(3),
            ..Default::default()
        };
        assert_eq!(defaults.get("os_template"), Some(FieldValue::Str("debian-12".to_string())));
        assert_eq!(defaults.get("package_id"), Some(FieldValue::Int(3)));
        assert_eq!(defaults.get("nonsense"), None);
    }

    #[test]
    fn test_save_never_writes_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config {
            endpoint: Some("cp.example.com".to_string()),
            api_token: Some("super-secret".to_string()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("super-secret"));
        let loaded = Config::load_from(&path);
        assert_eq!(loaded.endpoint.as_deref(), Some("cp.example.com"));
        assert_eq!(loaded.api_token, None);
    }

    #[test]
    fn test_overlay_keeps_unset_values() {
        let mut config = Config {
            endpoint: Some("cp.example.com".to_string()),
            default_package_id: Some(2),
            timeout_secs: Some(10),
            ..Default::default()
        };
        config.overlay(Config {
            default_package_id: Some(5),
            default_os_template: Some("debian-12".to_string()),
            ..Default::default()
        });

        assert_eq!(config.endpoint.as_deref(), Some("cp.example.com"));
        assert_eq!(config.default_package_id, Some(5));
        assert_eq!(config.default_os_template.as_deref(), Some("debian-12"));
        assert_eq!(config.timeout_secs, Some(10));
    }

    #[test]
    fn test_overlay_then_save_round_trips_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::load_from(&path);
        config.overlay(Config {
            endpoint: Some("cp.example.com".to_string()),
            api_token: Some("super-secret".to_string()),
            default_hypervisor_group_id: Some(4),
            ..Default::default()
        });
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded.endpoint.as_deref(), Some("cp.example.com"));
        assert_eq!(loaded.default_hypervisor_group_id, Some(4));
        assert_eq!(loaded.api_token, None);
    }
}
