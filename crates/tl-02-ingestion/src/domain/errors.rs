//! Error taxonomy for ingestion.
//!
//! - token validation failures (client-caused, never retried server-side)
//! - overload (transient, caller retries later)
//! - persistence conflicts and fatal storage errors

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error codes surfaced to submitters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    InvalidKey,
    AuthenticationFailed,
    AccessDenied,
    TooManyRequest,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::InvalidKey => "invalid_key",
            ErrorCode::AuthenticationFailed => "authentication_failed",
            ErrorCode::AccessDenied => "access_denied",
            ErrorCode::TooManyRequest => "too_many_request",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a token failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationErrorKind {
    MalformedToken,
    Expired,
    NotYetValid,
    /// Signature did not verify with the registered key.
    InvalidSignature,
    /// Token names a key the caller has not registered.
    SignatureKeyNotFound,
    MissingEncryptionAlgorithm,
    DecryptionFailed,
    DecompressionFailed,
    CriticalHeaderMissing,
    CriticalHeaderUnsupported,
    InvalidClaim,
    MissingClaim,
    InvalidHeader,
    MissingHeader,
}

/// A typed validation failure, carrying the offending claim or header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub kind: ValidationErrorKind,
    pub subject: Option<String>,
}

impl ValidationFailure {
    pub fn new(kind: ValidationErrorKind) -> Self {
        Self {
            kind,
            subject: None,
        }
    }

    pub fn with_subject(kind: ValidationErrorKind, subject: impl Into<String>) -> Self {
        Self {
            kind,
            subject: Some(subject.into()),
        }
    }

    pub fn malformed() -> Self {
        Self::new(ValidationErrorKind::MalformedToken)
    }

    pub fn missing_claim(claim: &str) -> Self {
        Self::with_subject(ValidationErrorKind::MissingClaim, claim)
    }

    pub fn invalid_claim(claim: &str) -> Self {
        Self::with_subject(ValidationErrorKind::InvalidClaim, claim)
    }

    pub fn missing_header(header: &str) -> Self {
        Self::with_subject(ValidationErrorKind::MissingHeader, header)
    }

    pub fn invalid_header(header: &str) -> Self {
        Self::with_subject(ValidationErrorKind::InvalidHeader, header)
    }

    /// Key errors: the signer is unknown or untrusted.
    pub fn is_key_error(&self) -> bool {
        matches!(
            self.kind,
            ValidationErrorKind::InvalidSignature | ValidationErrorKind::SignatureKeyNotFound
        )
    }

    pub fn error_code(&self) -> ErrorCode {
        if self.is_key_error() {
            ErrorCode::InvalidKey
        } else {
            ErrorCode::InvalidRequest
        }
    }

    /// Human-readable description. `None` for key errors.
    pub fn description(&self) -> Option<String> {
        let subject = self.subject.as_deref().unwrap_or_default();
        let text = match self.kind {
            ValidationErrorKind::InvalidSignature | ValidationErrorKind::SignatureKeyNotFound => {
                return None
            }
            ValidationErrorKind::MalformedToken => "Malformed token.".to_string(),
            ValidationErrorKind::Expired => "Expired token.".to_string(),
            ValidationErrorKind::NotYetValid => "The token is not yet valid.".to_string(),
            ValidationErrorKind::MissingEncryptionAlgorithm => {
                "Missing encryption algorithm in the header.".to_string()
            }
            ValidationErrorKind::DecryptionFailed => "Unable to decrypt the token.".to_string(),
            ValidationErrorKind::DecompressionFailed => {
                "Unable to decompress the token.".to_string()
            }
            ValidationErrorKind::CriticalHeaderMissing => {
                format!("The critical header '{}' is missing.", subject)
            }
            ValidationErrorKind::CriticalHeaderUnsupported => {
                format!("The critical header '{}' is not supported.", subject)
            }
            ValidationErrorKind::InvalidClaim => format!("The claim '{}' is invalid.", subject),
            ValidationErrorKind::MissingClaim => format!("The claim '{}' is missing.", subject),
            ValidationErrorKind::InvalidHeader => format!("The header '{}' is invalid.", subject),
            ValidationErrorKind::MissingHeader => format!("The header '{}' is missing.", subject),
        };
        Some(text)
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(description) => f.write_str(&description),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl std::error::Error for ValidationFailure {}

/// Record persistence errors, returned as a typed result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A record with this issuer and id already exists. Benign.
    #[error("Duplicate record: issuer={issuer}, id={id}")]
    DuplicateKey { issuer: String, id: String },

    #[error("Storage failure: {message}")]
    Fatal { message: String },
}

impl StoreError {
    pub fn fatal(message: impl Into<String>) -> Self {
        StoreError::Fatal {
            message: message.into(),
        }
    }
}

/// Submission errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("Token validation failed: {0}")]
    Validation(ValidationFailure),

    /// Queue full; caller should retry later.
    #[error("Ingestion queue full (capacity {capacity})")]
    Overloaded { capacity: usize },

    #[error("Submission cancelled")]
    Cancelled,

    #[error("Ingestion pipeline closed")]
    Closed,

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<ValidationFailure> for IngestError {
    fn from(failure: ValidationFailure) -> Self {
        IngestError::Validation(failure)
    }
}
