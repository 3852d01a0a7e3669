//! # Ingestion Service
//!
//! Producers call [`IngestionService::submit`]; the pipeline owns the bounded
//! queue and the single [`PersistenceWorker`](crate::worker) that drains it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tl_01_merkle_log::MerkleLogApi;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::entities::AuditRecord;
use crate::domain::errors::IngestError;
use crate::domain::policy::ValidationPolicy;
use crate::ports::inbound::{IngestionApi, SubmitOutcome};
use crate::ports::outbound::{DuplicateStore, RecordStore, TokenValidator};
use crate::worker::{PersistenceWorker, Persister, WorkerStats};

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Records buffered between submitters and the worker.
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.queue_capacity == 0 {
            return Err(IngestError::Config(
                "queue_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Collaborators wired into the pipeline.
#[derive(Clone)]
pub struct PipelineDependencies {
    pub validator: Arc<dyn TokenValidator>,
    pub duplicates: Arc<dyn DuplicateStore>,
    pub records: Arc<dyn RecordStore>,
    /// Records are stored without a log commitment when absent.
    pub log: Option<Arc<dyn MerkleLogApi>>,
}

/// Running pipeline: submission front end plus its worker task.
pub struct IngestionPipeline {
    service: Arc<IngestionService>,
    shutdown_tx: watch::Sender<bool>,
    worker: JoinHandle<WorkerStats>,
}

impl IngestionPipeline {
    /// Start the worker. Must be called within a Tokio runtime.
    pub fn spawn(config: PipelineConfig, deps: PipelineDependencies) -> Result<Self, IngestError> {
        config.validate()?;

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let persister = Persister::new(deps.records, Arc::clone(&deps.duplicates), deps.log);
        let worker = PersistenceWorker::new(receiver, shutdown_rx.clone(), persister);
        let worker = tokio::spawn(worker.run());

        info!(capacity = config.queue_capacity, "Ingestion pipeline started");

        Ok(Self {
            service: Arc::new(IngestionService {
                sender,
                validator: deps.validator,
                duplicates: deps.duplicates,
                capacity: config.queue_capacity,
                shutdown: shutdown_rx,
            }),
            shutdown_tx,
            worker,
        })
    }

    pub fn service(&self) -> Arc<IngestionService> {
        Arc::clone(&self.service)
    }

    /// A receiver that flips to `true` once shutdown begins.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Stop accepting submissions, drain the queue and wait for the worker.
    pub async fn shutdown(self) -> WorkerStats {
        info!("Initiating pipeline shutdown...");
        if self.shutdown_tx.send(true).is_err() {
            warn!("Persistence worker already stopped");
        }
        match self.worker.await {
            Ok(stats) => stats,
            Err(e) => {
                error!("Persistence worker panicked: {}", e);
                WorkerStats::default()
            }
        }
    }
}

/// Submission front end. Cheap to share across request handlers.
pub struct IngestionService {
    sender: mpsc::Sender<AuditRecord>,
    validator: Arc<dyn TokenValidator>,
    duplicates: Arc<dyn DuplicateStore>,
    capacity: usize,
    shutdown: watch::Receiver<bool>,
}

impl IngestionService {
    fn ensure_running(&self) -> Result<(), IngestError> {
        if *self.shutdown.borrow() {
            return Err(IngestError::Cancelled);
        }
        Ok(())
    }

    /// Number of records waiting for the worker.
    pub fn queue_len(&self) -> usize {
        self.capacity - self.sender.capacity()
    }
}

#[async_trait]
impl IngestionApi for IngestionService {
    async fn submit(
        &self,
        client_id: &str,
        raw: &[u8],
        policy: &ValidationPolicy,
    ) -> Result<SubmitOutcome, IngestError> {
        self.ensure_running()?;

        let mut record = self.validator.validate(raw, policy)?;
        record.client_id = client_id.to_string();

        self.ensure_running()?;

        if !self
            .duplicates
            .try_add(&record.issuer, &record.id, record.issued_at)?
        {
            debug!(issuer = %record.issuer, jti = %record.id, "Token already recorded");
            return Ok(SubmitOutcome::AlreadyRecorded);
        }

        let (issuer, id) = (record.issuer.clone(), record.id.clone());
        let failure = match self.sender.try_send(record) {
            Ok(()) => {
                debug!(client = client_id, jti = %id, "Token enqueued");
                return Ok(SubmitOutcome::Accepted);
            }
            Err(TrySendError::Full(_)) => {
                warn!(capacity = self.capacity, "Ingestion queue full, rejecting token");
                IngestError::Overloaded {
                    capacity: self.capacity,
                }
            }
            Err(TrySendError::Closed(_)) => IngestError::Closed,
        };

        if let Err(e) = self.duplicates.release(&issuer, &id) {
            error!(jti = %id, error = %e, "Failed to release duplicate reservation");
        }
        Err(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert_eq!(config.queue_capacity, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = PipelineConfig { queue_capacity: 0 };
        assert!(matches!(config.validate(), Err(IngestError::Config(_))));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }
}
