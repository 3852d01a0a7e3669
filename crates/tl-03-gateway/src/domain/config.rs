//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;

/// Main gateway configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Socket the HTTP server binds
    pub listen_addr: SocketAddr,
    /// Route accepting token submissions
    pub path: String,
    /// Audience every token must name in `aud`
    pub audience: String,
    /// `Retry-After` value sent with 429 responses
    pub retry_after_secs: u64,
    /// Largest accepted request body
    pub max_body_bytes: usize,
    /// API keys identifying submitting clients
    pub credentials: Vec<ClientCredential>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            path: "/events".to_string(),
            audience: String::new(),
            retry_after_secs: 60,
            max_body_bytes: 64 * 1024,
            credentials: Vec::new(),
        }
    }
}

/// API key assigned to one client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredential {
    pub client_id: String,
    pub api_key: String,
}

impl std::fmt::Debug for ClientCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredential")
            .field("client_id", &self.client_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.path.starts_with('/') {
            return Err(ConfigError::InvalidPath(self.path.clone()));
        }

        if self.audience.trim().is_empty() {
            return Err(ConfigError::Invalid("audience cannot be empty".into()));
        }

        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_body_bytes cannot be 0".into(),
            ));
        }

        let mut seen = HashSet::new();
        for credential in &self.credentials {
            if credential.api_key.is_empty() {
                return Err(ConfigError::InvalidCredential(format!(
                    "client '{}' has an empty api_key",
                    credential.client_id
                )));
            }
            if !seen.insert(credential.api_key.as_str()) {
                return Err(ConfigError::InvalidCredential(format!(
                    "api_key of client '{}' is shared with another client",
                    credential.client_id
                )));
            }
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
