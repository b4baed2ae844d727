//! Adapter configuration
//!
//! Resolved once by the composition root and passed into `PodStorage`. Store
//! methods never read the environment themselves.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{PodError, Result};

/// Where the policy resource of a protected resource is looked up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyDiscoveryMode {
    /// `Link: <...>; rel="acl"` from a HEAD request, suffix as fallback
    #[default]
    LinkHeader,
    /// Always `{resource}.acl`
    Suffix,
}

/// How the bearer credential reaches the transport
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CredentialSource {
    /// The auth subsystem hands a ready transport in per request
    #[default]
    Session,
    /// Fixed token, for tooling and service accounts
    StaticToken { token: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodConfig {
    /// Skip storage discovery and use this base URL
    pub storage_origin: Option<String>,
    /// Container under the storage base holding everything this adapter writes
    pub root_container: String,
    pub credential_source: CredentialSource,
    pub policy_discovery: PolicyDiscoveryMode,
    /// Upper bound on containers probed when a message update lacks its conversation id
    pub max_reverse_lookup_containers: usize,
    pub request_timeout_secs: u64,
}

impl Default for PodConfig {
    fn default() -> Self {
        Self {
            storage_origin: None,
            root_container: "chat".to_string(),
            credential_source: CredentialSource::default(),
            policy_discovery: PolicyDiscoveryMode::default(),
            max_reverse_lookup_containers: 500,
            request_timeout_secs: 30,
        }
    }
}

impl PodConfig {
    /// Load configuration from a TOML file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: PodConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Build from `POD_*` environment variables (after loading `.env`)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::default();

        if let Ok(origin) = std::env::var("POD_STORAGE_ORIGIN") {
            config.storage_origin = Some(origin);
        }
        if let Ok(root) = std::env::var("POD_ROOT_CONTAINER") {
            config.root_container = root;
        }
        if let Ok(mode) = std::env::var("POD_POLICY_DISCOVERY") {
            config.policy_discovery = match mode.to_lowercase().as_str() {
                "link-header" | "link" => PolicyDiscoveryMode::LinkHeader,
                "suffix" => PolicyDiscoveryMode::Suffix,
                other => {
                    return Err(PodError::Config(format!(
                        "POD_POLICY_DISCOVERY must be link-header or suffix, got {}",
                        other
                    )));
                }
            };
        }
        if let Ok(token) = std::env::var("POD_ACCESS_TOKEN") {
            config.credential_source = CredentialSource::StaticToken { token };
        }
        if let Ok(max) = std::env::var("POD_MAX_REVERSE_LOOKUP") {
            config.max_reverse_lookup_containers = max
                .parse()
                .map_err(|_| PodError::Config(format!("POD_MAX_REVERSE_LOOKUP: {}", max)))?;
        }
        if let Ok(secs) = std::env::var("POD_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = secs
                .parse()
                .map_err(|_| PodError::Config(format!("POD_REQUEST_TIMEOUT_SECS: {}", secs)))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let root = self.root_container.trim_matches('/');
        if root.is_empty() || root.contains('/') {
            return Err(PodError::Config(format!(
                "root_container must be a single path segment, got {:?}",
                self.root_container
            )));
        }
        if let Some(origin) = &self.storage_origin {
            url::Url::parse(origin)
                .map_err(|e| PodError::Config(format!("storage_origin {}: {}", origin, e)))?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn static_token(&self) -> Option<&str> {
        match &self.credential_source {
            CredentialSource::StaticToken { token } => Some(token),
            CredentialSource::Session => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml() {
        let config: PodConfig = toml::from_str(
            r#"
storage_origin = "https://pod.example/alice/"
root_container = "librechat"
policy_discovery = "suffix"

[credential_source]
kind = "static-token"
token = "abc"
"#,
        )
        .unwrap();
        assert_eq!(config.root_container, "librechat");
        assert_eq!(config.policy_discovery, PolicyDiscoveryMode::Suffix);
        assert_eq!(config.static_token(), Some("abc"));
        assert_eq!(config.max_reverse_lookup_containers, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nested_root() {
        let config = PodConfig {
            root_container: "a/b".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PodError::Config(_))));
    }
}
