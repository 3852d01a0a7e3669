//! # Inbound Ports (Driving Ports)

use async_trait::async_trait;

use crate::domain::errors::IngestError;
use crate::domain::policy::ValidationPolicy;

/// Result of a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Validated and enqueued; durability follows asynchronously.
    Accepted,
    /// Same issuer and id already recorded; nothing enqueued.
    AlreadyRecorded,
}

/// Submission API used by transports.
#[async_trait]
pub trait IngestionApi: Send + Sync {
    /// Validate `raw` under `policy` and enqueue it for persistence.
    ///
    /// Never blocks on a full queue: returns `IngestError::Overloaded`.
    async fn submit(
        &self,
        client_id: &str,
        raw: &[u8],
        policy: &ValidationPolicy,
    ) -> Result<SubmitOutcome, IngestError>;
}
