//! # Security-Event Token Ingestion
//!
//! Validates signed security-event tokens, sheds load through a bounded
//! queue, and hands accepted records to a single worker that stores them and
//! appends their content hash to the Merkle log.
//!
//! ## Flow
//!
//! ```text
//!  submit(client, raw, policy)
//!     │
//!     ├─ TokenValidator ──────────► Err(Validation)
//!     ├─ DuplicateStore::try_add ─► Ok(AlreadyRecorded)
//!     ├─ queue.try_send ──────────► Err(Overloaded) when full
//!     ↓
//!  Ok(Accepted)
//!     ┆  bounded mpsc
//!     ↓
//!  PersistenceWorker (exactly one)
//!     ├─ RecordStore::store(record)
//!     ├─ MerkleLogApi::append(SHA-256(raw)) ─► STH
//!     └─ RecordStore::attach_commitment(STH)
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Persist/append order equals enqueue order | single worker task |
//! | Producers never block on a full queue | `try_send`, `Overloaded` |
//! | A rejected submission leaves no reservation | `DuplicateStore::release` |
//! | A record the worker fails to store leaves no reservation | `DuplicateStore::release` |
//! | No leaf without a stored record | store first; withdraw on append failure |
//! | Record and keyring entry commit together | one atomic batch |
//! | Enqueued records are drained on shutdown | close, then drain |

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;
pub mod worker;

pub use adapters::{
    encode_compact_jws, CompactJwsValidator, FileSystemDuplicateStore, FileSystemRecordStore,
    InMemoryDuplicateStore, KvRecordStore, DEFAULT_DUPLICATE_TTL_SECS,
};
pub use domain::{
    AuditRecord, ClientRegistration, ErrorCode, IngestError, KeyMaterial, RecordKey,
    SignatureAlgorithm, StoreError, StoredRecord, ValidationErrorKind, ValidationFailure,
    ValidationPolicy, DEFAULT_CLOCK_SKEW_SECS,
};
pub use ports::{
    DuplicateStore, FixedTimeSource, IngestionApi, RecordStore, SubmitOutcome, SystemTimeSource,
    TimeSource, TokenValidator,
};
pub use service::{IngestionPipeline, IngestionService, PipelineConfig, PipelineDependencies};
pub use worker::WorkerStats;
