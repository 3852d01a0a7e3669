//! Error types for the Merkle log.
//!
//! Range errors (caller asked for something outside the committed tree) are
//! kept apart from storage and corruption errors so a verifier can tell
//! "the log lied" from "the log is unreachable".

use thiserror::Error;

/// Key-value storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    #[error("I/O error: {message}")]
    IOError { message: String },

    #[error("Store is closed")]
    Closed,
}

/// Tree head signing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("Signing key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("Invalid signing key")]
    InvalidKey,

    #[error("Unsupported digest length: {0} bytes")]
    UnsupportedDigest(usize),

    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

/// Errors raised while mutating or reading tree state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleTreeError {
    /// An index or size lies beyond what the tree can answer for.
    #[error("{name} out of range: {value} (limit {limit})")]
    OutOfRange {
        name: &'static str,
        value: u64,
        limit: u64,
    },

    /// The first size of a consistency request exceeds the second.
    #[error("Invalid range: tree size {first} is greater than {second}")]
    InvalidRange { first: u64, second: u64 },

    #[error("Storage failure: {0}")]
    Storage(#[from] KVStoreError),

    /// Stored state violates a tree invariant.
    #[error("Tree state corrupted: {message}")]
    Corrupted { message: String },

    #[error("Tree head signing failed: {0}")]
    Signing(#[from] SignerError),

    #[error("Encoding error: {message}")]
    Encoding { message: String },
}

impl MerkleTreeError {
    /// True for bounds errors (caller mistakes, not tree corruption).
    pub fn is_range_error(&self) -> bool {
        matches!(
            self,
            MerkleTreeError::OutOfRange { .. } | MerkleTreeError::InvalidRange { .. }
        )
    }

    pub(crate) fn corrupted(message: impl Into<String>) -> Self {
        MerkleTreeError::Corrupted {
            message: message.into(),
        }
    }
}
