//! # Persistence Worker
//!
//! The single consumer of the ingestion queue. Records are persisted and
//! appended to the log strictly in enqueue order, which is what gives leaf
//! indices their meaning.
//!
//! ## Per-record unit of work
//!
//! ```text
//! content_hash = SHA-256(raw)
//!       │
//!       ├── already stored? ──► warn, skip
//!       │
//!       ├── records.store(record)
//!       │     ├── DuplicateKey  ──► warn, skip
//!       │     └── Fatal         ──► error, release reservation
//!       │
//!       └── log.append(content_hash)            (when a log is configured)
//!             ├── Ok   ──► records.attach_commitment(STH)
//!             └── Err  ──► remove record, release reservation
//! ```
//!
//! A record that is not durably stored never keeps its `(issuer, jti)`
//! reservation, so the producer can resubmit it. Storage calls block, so each
//! record is handled on the blocking pool.

use std::sync::Arc;
use tl_01_merkle_log::{HashAlgorithm, MerkleHasher, MerkleLogApi};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::domain::entities::{AuditRecord, StoredRecord};
use crate::domain::errors::StoreError;
use crate::ports::outbound::{DuplicateStore, RecordStore};

/// Counters reported when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Records durably stored.
    pub persisted: u64,
    /// Leaves appended to the log.
    pub appended: u64,
    /// Records skipped as already stored.
    pub duplicates: u64,
    /// Records dropped by a storage or log failure.
    pub failures: u64,
}

impl WorkerStats {
    fn count(&mut self, outcome: PersistOutcome) {
        match outcome {
            PersistOutcome::Persisted { appended } => {
                self.persisted += 1;
                if appended {
                    self.appended += 1;
                }
            }
            PersistOutcome::Duplicate => self.duplicates += 1,
            PersistOutcome::Failed => self.failures += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PersistOutcome {
    Persisted { appended: bool },
    Duplicate,
    Failed,
}

/// Synchronous per-record persistence.
pub(crate) struct Persister {
    records: Arc<dyn RecordStore>,
    duplicates: Arc<dyn DuplicateStore>,
    log: Option<Arc<dyn MerkleLogApi>>,
    hasher: MerkleHasher,
}

impl Persister {
    pub(crate) fn new(
        records: Arc<dyn RecordStore>,
        duplicates: Arc<dyn DuplicateStore>,
        log: Option<Arc<dyn MerkleLogApi>>,
    ) -> Self {
        Self {
            records,
            duplicates,
            log,
            hasher: MerkleHasher::new(HashAlgorithm::Sha256),
        }
    }

    pub(crate) fn persist(&self, record: AuditRecord) -> PersistOutcome {
        let content_hash = self.hasher.hash_content(&record.raw);
        let (issuer, id) = (record.issuer.clone(), record.id.clone());

        match self.records.contains(&issuer, &id) {
            Ok(true) => {
                warn!(%issuer, jti = %id, "Duplicate document. The document will be ignored.");
                return PersistOutcome::Duplicate;
            }
            Ok(false) => {}
            Err(e) => {
                error!(jti = %id, error = %e, "Duplicate check failed");
                self.release(&issuer, &id);
                return PersistOutcome::Failed;
            }
        }

        let client_id = record.client_id.clone();
        let stored = StoredRecord::new(record, content_hash, None);
        match self.records.store(&stored) {
            Ok(()) => {}
            Err(StoreError::DuplicateKey { issuer, id }) => {
                warn!(%issuer, jti = %id, "Duplicate document. The document will be ignored.");
                return PersistOutcome::Duplicate;
            }
            Err(e @ StoreError::Fatal { .. }) => {
                error!(jti = %id, error = %e, "Failed to store record");
                self.release(&issuer, &id);
                return PersistOutcome::Failed;
            }
        }

        let Some(log) = &self.log else {
            info!(client = %client_id, "'{}' has been recorded", id);
            return PersistOutcome::Persisted { appended: false };
        };

        let head = match log.append(stored.content_hash.as_bytes()) {
            Ok(head) => head,
            Err(e) => {
                error!(jti = %id, error = %e, "Log append failed; record withdrawn");
                match self.records.remove(&issuer, &id) {
                    Ok(()) => self.release(&issuer, &id),
                    Err(e) => {
                        error!(jti = %id, error = %e, "Cannot withdraw record; it stays stored without a tree head")
                    }
                }
                return PersistOutcome::Failed;
            }
        };
        debug!(jti = %id, tree_size = head.tree_size, root = %head.root_hash, "Leaf appended");

        if let Err(e) = self.records.attach_commitment(&issuer, &id, &head) {
            // The leaf is committed; its head can be recovered from the log.
            error!(jti = %id, tree_size = head.tree_size, error = %e, "Failed to attach tree head to record");
        }
        info!(client = %client_id, tree_size = head.tree_size, "'{}' has been recorded", id);
        PersistOutcome::Persisted { appended: true }
    }

    fn release(&self, issuer: &str, id: &str) {
        if let Err(e) = self.duplicates.release(issuer, id) {
            error!(jti = %id, error = %e, "Failed to release duplicate reservation");
        }
    }
}

pub(crate) struct PersistenceWorker {
    receiver: mpsc::Receiver<AuditRecord>,
    shutdown: watch::Receiver<bool>,
    persister: Arc<Persister>,
    stats: WorkerStats,
}

impl PersistenceWorker {
    pub(crate) fn new(
        receiver: mpsc::Receiver<AuditRecord>,
        shutdown: watch::Receiver<bool>,
        persister: Persister,
    ) -> Self {
        Self {
            receiver,
            shutdown,
            persister: Arc::new(persister),
            stats: WorkerStats::default(),
        }
    }

    /// Drain the queue until shutdown, then close it and drain what is left.
    pub(crate) async fn run(mut self) -> WorkerStats {
        info!("Persistence worker started");

        loop {
            tokio::select! {
                biased;
                next = self.receiver.recv() => match next {
                    Some(record) => self.handle(record).await,
                    None => break,
                },
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("Shutdown signal received, draining queue");
                        break;
                    }
                }
            }
        }

        self.receiver.close();
        while let Some(record) = self.receiver.recv().await {
            self.handle(record).await;
        }

        info!(
            persisted = self.stats.persisted,
            appended = self.stats.appended,
            duplicates = self.stats.duplicates,
            failures = self.stats.failures,
            "Persistence worker stopped"
        );
        self.stats
    }

    /// One record at a time: the next is not dequeued until this one is done.
    async fn handle(&mut self, record: AuditRecord) {
        let persister = Arc::clone(&self.persister);
        let outcome = match tokio::task::spawn_blocking(move || persister.persist(record)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Persistence task failed: {}", e);
                PersistOutcome::Failed
            }
        };
        self.stats.count(outcome);
    }
}
