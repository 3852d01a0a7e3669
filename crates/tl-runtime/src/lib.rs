//! # Transparency Log Hub Runtime
//!
//! Wires storage, the Merkle log, the ingestion pipeline and the HTTP
//! gateway into one process.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (TOML file + `TL_*` environment)
//! 2. Open the key-value store (memory or RocksDB)
//! 3. Load or generate the tree head signing key
//! 4. Verify the stored tree against its latest head
//! 5. Start the persistence worker
//! 6. Load client registrations, bind the gateway
//!
//! ## Shutdown Sequence
//!
//! 1. Stop the gateway (in-flight requests complete)
//! 2. Signal the pipeline; the worker drains every enqueued record
//! 3. Report worker counters and the final tree size

pub mod config;

use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tl_01_merkle_log::{
    EcdsaTreeSigner, InMemoryKVStore, KeyValueStore, KvLogStorage, MerkleLogApi, MerkleLogService,
};
use tl_02_ingestion::{
    CompactJwsValidator, DuplicateStore, FileSystemDuplicateStore, FileSystemRecordStore,
    InMemoryDuplicateStore, IngestionPipeline, KvRecordStore, PipelineDependencies, RecordStore,
    SystemTimeSource, WorkerStats,
};
use tl_03_gateway::{
    ClientRegistry, FileRegistrationSource, GatewayService, RegistrationSource, RunningGateway,
    StaticRegistrationSource,
};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::{HubConfig, RecordBackend, StorageBackend};

const LOG_NAMESPACE: &str = "log";
const RECORD_NAMESPACE: &str = "records";
const DUPLICATE_PURGE_INTERVAL: Duration = Duration::from_secs(600);

/// A running hub.
pub struct HubRuntime {
    pipeline: IngestionPipeline,
    gateway: RunningGateway,
    log: Arc<dyn MerkleLogApi>,
}

impl HubRuntime {
    /// Open storage and start every component.
    pub async fn start(config: HubConfig) -> Result<Self> {
        match config.storage.backend {
            StorageBackend::Memory => {
                warn!("Using in-memory storage; the log is lost on exit");
                Self::start_with_store(config, Arc::new(InMemoryKVStore::new())).await
            }
            StorageBackend::RocksDb => {
                #[cfg(feature = "rocksdb")]
                {
                    let store = open_rocksdb(&config.storage)?;
                    Self::start_with_store(config, store).await
                }
                #[cfg(not(feature = "rocksdb"))]
                {
                    bail!("storage backend 'rocksdb' requires building with the `rocksdb` feature")
                }
            }
        }
    }

    async fn start_with_store<K>(config: HubConfig, store: Arc<K>) -> Result<Self>
    where
        K: KeyValueStore + 'static,
    {
        let signer = match &config.signing.key_hex {
            Some(key_hex) => {
                EcdsaTreeSigner::from_hex(key_hex).context("invalid tree head signing key")?
            }
            None => {
                warn!("No signing key configured; generated an ephemeral key");
                EcdsaTreeSigner::generate()
            }
        };
        info!(public_key = %hex::encode(signer.public_key()), "Tree head signing key loaded");

        let log = Arc::new(MerkleLogService::new(
            Arc::new(KvLogStorage::new(Arc::clone(&store), LOG_NAMESPACE)),
            Arc::new(signer),
            config.log.clone(),
        ));
        if !log.verify_integrity().context("cannot read the stored log")? {
            bail!("stored log does not match its latest tree head");
        }
        info!(tree_size = log.tree_size()?, bucket = %config.log.bucket, "Merkle log ready");

        let records: Arc<dyn RecordStore> = match config.storage.records {
            RecordBackend::Kv => Arc::new(KvRecordStore::new(store, RECORD_NAMESPACE)),
            RecordBackend::Files => Arc::new(
                FileSystemRecordStore::open(config.storage.data_dir.join("records"))
                    .context("cannot open record directory")?,
            ),
        };

        let in_memory_duplicates = (!config.duplicates.persistent).then(|| {
            Arc::new(InMemoryDuplicateStore::new(
                config.duplicates.ttl_secs,
                Arc::new(SystemTimeSource),
            ))
        });
        let duplicates: Arc<dyn DuplicateStore> = match &in_memory_duplicates {
            Some(store) => store.clone(),
            None => Arc::new(
                FileSystemDuplicateStore::open(config.storage.data_dir.join("duplicates"))
                    .context("cannot open duplicate directory")?,
            ),
        };

        let log_api: Arc<dyn MerkleLogApi> = log;
        let pipeline = IngestionPipeline::spawn(
            config.pipeline.clone(),
            PipelineDependencies {
                validator: Arc::new(CompactJwsValidator::default()),
                duplicates,
                records,
                log: Some(Arc::clone(&log_api)),
            },
        )?;

        if let Some(store) = in_memory_duplicates {
            spawn_duplicate_purge(store, pipeline.shutdown_signal());
        }

        let source = registration_source(&config);
        let registry = ClientRegistry::load(source, config.gateway.audience.clone())
            .await
            .context("cannot load client registrations")?;
        if registry.is_empty() {
            warn!("No client registrations loaded; every submission will be denied");
        }

        let gateway = GatewayService::new(config.gateway, pipeline.service(), Arc::new(registry))?;
        let gateway = gateway.start().await?;

        Ok(Self {
            pipeline,
            gateway,
            log: log_api,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.gateway.local_addr()
    }

    pub fn log(&self) -> Arc<dyn MerkleLogApi> {
        Arc::clone(&self.log)
    }

    /// Stop the gateway, then drain the pipeline.
    pub async fn shutdown(self) -> WorkerStats {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.gateway.shutdown().await {
            error!("Gateway shutdown failed: {}", e);
        }

        let stats = self.pipeline.shutdown().await;
        match self.log.tree_size() {
            Ok(size) => info!(tree_size = size, "Shutdown complete"),
            Err(e) => error!("Cannot read final tree size: {}", e),
        }
        stats
    }
}

fn registration_source(config: &HubConfig) -> Arc<dyn RegistrationSource> {
    match &config.clients.file {
        Some(path) => Arc::new(FileRegistrationSource::new(path)),
        None => Arc::new(StaticRegistrationSource::new(
            config.clients.registrations.clone(),
        )),
    }
}

fn spawn_duplicate_purge(store: Arc<InMemoryDuplicateStore>, mut shutdown: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(DUPLICATE_PURGE_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    store.purge_expired();
                }
                _ = shutdown.changed() => break,
            }
        }
    });
}

#[cfg(feature = "rocksdb")]
fn open_rocksdb(storage: &crate::config::StorageConfig) -> Result<Arc<tl_01_merkle_log::RocksDbStore>> {
    use tl_01_merkle_log::{RocksDbConfig, RocksDbStore};

    let path = storage.data_dir.join("db");
    ensure_dir(&storage.data_dir)?;
    let config = RocksDbConfig {
        path: path.to_string_lossy().into_owned(),
        sync_writes: storage.sync_writes,
        ..RocksDbConfig::default()
    };
    info!(path = %path.display(), "Opening RocksDB");
    Ok(Arc::new(RocksDbStore::open(config)?))
}

#[cfg(feature = "rocksdb")]
fn ensure_dir(path: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(path).with_context(|| format!("cannot create {}", path.display()))
}
