//! Client registrations and the validation policy derived from them.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::IngestError;

/// Default tolerance for `exp`/`nbf`/`iat` checks.
pub const DEFAULT_CLOCK_SKEW_SECS: u64 = 300;

/// Accepted token signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    HS256,
    HS384,
    HS512,
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::HS256 => "HS256",
            SignatureAlgorithm::HS384 => "HS384",
            SignatureAlgorithm::HS512 => "HS512",
        }
    }

    pub fn from_header(value: &str) -> Option<Self> {
        match value {
            "HS256" => Some(SignatureAlgorithm::HS256),
            "HS384" => Some(SignatureAlgorithm::HS384),
            "HS512" => Some(SignatureAlgorithm::HS512),
            _ => None,
        }
    }
}

/// Verification key for a client's tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub key_id: Option<String>,
    pub algorithm: SignatureAlgorithm,
    pub secret: Vec<u8>,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// What a token must satisfy to be accepted from one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Required `aud` value.
    pub audience: String,
    pub key: KeyMaterial,
    pub clock_skew_secs: u64,
}

/// A registered token producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistration {
    pub client_id: String,
    pub algorithm: SignatureAlgorithm,
    #[serde(default)]
    pub key_id: Option<String>,
    /// Base64url (unpadded) shared secret.
    pub secret: String,
    #[serde(default)]
    pub clock_skew_secs: Option<u64>,
}

impl ClientRegistration {
    /// Build the policy requiring a security-event token for `audience`,
    /// signed with this client's key.
    pub fn build_policy(&self, audience: &str) -> Result<ValidationPolicy, IngestError> {
        let secret = URL_SAFE_NO_PAD
            .decode(self.secret.trim_end_matches('=').as_bytes())
            .map_err(|e| {
                IngestError::Config(format!(
                    "client '{}' has an invalid secret: {}",
                    self.client_id, e
                ))
            })?;
        if secret.is_empty() {
            return Err(IngestError::Config(format!(
                "client '{}' has an empty secret",
                self.client_id
            )));
        }

        Ok(ValidationPolicy {
            audience: audience.to_string(),
            key: KeyMaterial {
                key_id: self.key_id.clone(),
                algorithm: self.algorithm,
                secret,
            },
            clock_skew_secs: self.clock_skew_secs.unwrap_or(DEFAULT_CLOCK_SKEW_SECS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(secret: &str) -> ClientRegistration {
        ClientRegistration {
            client_id: "client-1".into(),
            algorithm: SignatureAlgorithm::HS256,
            key_id: Some("k1".into()),
            secret: secret.into(),
            clock_skew_secs: None,
        }
    }

    #[test]
    fn test_build_policy_decodes_secret() {
        let policy = registration("c2VjcmV0").build_policy("https://hub").unwrap();
        assert_eq!(policy.key.secret, b"secret".to_vec());
        assert_eq!(policy.audience, "https://hub");
        assert_eq!(policy.clock_skew_secs, DEFAULT_CLOCK_SKEW_SECS);
    }

    #[test]
    fn test_build_policy_rejects_bad_secret() {
        assert!(registration("***").build_policy("aud").is_err());
        assert!(registration("").build_policy("aud").is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let policy = registration("c2VjcmV0").build_policy("aud").unwrap();
        let rendered = format!("{:?}", policy);
        assert!(!rendered.contains("115, 101"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_registration_deserializes_from_json() {
        let json = r#"{"client_id":"c","algorithm":"HS512","secret":"c2VjcmV0"}"#;
        let parsed: ClientRegistration = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.algorithm, SignatureAlgorithm::HS512);
        assert_eq!(parsed.key_id, None);
    }
}
