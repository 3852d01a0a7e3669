//! # Outbound Ports (Driven Ports)
//!
//! Collaborators the pipeline consumes: a token validator, a duplicate
//! store, a record store and a clock.

use std::time::{SystemTime, UNIX_EPOCH};

use tl_01_merkle_log::SignedTreeHead;

use crate::domain::entities::{AuditRecord, StoredRecord};
use crate::domain::errors::{StoreError, ValidationFailure};
use crate::domain::policy::ValidationPolicy;

/// Authenticates a raw token against a policy.
///
/// The returned record has an empty `client_id`; the pipeline fills it in.
pub trait TokenValidator: Send + Sync {
    fn validate(
        &self,
        raw: &[u8],
        policy: &ValidationPolicy,
    ) -> Result<AuditRecord, ValidationFailure>;
}

/// Pre-enqueue duplicate detection keyed by issuer and id.
pub trait DuplicateStore: Send + Sync {
    /// Reserve `(issuer, id)`. Returns `false` if already present.
    fn try_add(&self, issuer: &str, id: &str, issued_at: i64) -> Result<bool, StoreError>;

    /// Drop a reservation whose record was never durably stored.
    fn release(&self, issuer: &str, id: &str) -> Result<(), StoreError>;
}

/// Durable record storage.
pub trait RecordStore: Send + Sync {
    /// Persist a record and its keyring/index entries in one atomic unit.
    ///
    /// Returns `StoreError::DuplicateKey` if the record already exists.
    fn store(&self, record: &StoredRecord) -> Result<(), StoreError>;

    /// Record the tree head that committed an already stored record.
    fn attach_commitment(
        &self,
        issuer: &str,
        id: &str,
        head: &SignedTreeHead,
    ) -> Result<(), StoreError>;

    /// Delete a record and its keyring/index entries. Missing records are ignored.
    fn remove(&self, issuer: &str, id: &str) -> Result<(), StoreError>;

    fn contains(&self, issuer: &str, id: &str) -> Result<bool, StoreError>;

    fn get(&self, issuer: &str, id: &str) -> Result<Option<StoredRecord>, StoreError>;
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    /// Current timestamp in seconds since epoch.
    fn now(&self) -> i64;
}

/// Default time source using system time.
#[derive(Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// Fixed time source for tests and replay tooling.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource(pub i64);

impl TimeSource for FixedTimeSource {
    fn now(&self) -> i64 {
        self.0
    }
}
