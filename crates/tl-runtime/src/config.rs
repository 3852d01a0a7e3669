//! Hub configuration: TOML file (`TL_CONFIG`) overlaid with `TL_*`
//! environment variables.
//!
//! ```toml
//! [storage]
//! backend = "rocksdb"
//! data_dir = "/var/lib/tl"
//!
//! [gateway]
//! listen_addr = "0.0.0.0:8080"
//! audience = "https://hub.example.com"
//!
//! [[gateway.credentials]]
//! client_id = "issuer-a"
//! api_key = "..."
//!
//! [clients]
//! file = "/etc/tl/clients.json"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tl_01_merkle_log::LogConfig;
use tl_02_ingestion::{ClientRegistration, PipelineConfig, DEFAULT_DUPLICATE_TTL_SECS};
use tl_03_gateway::GatewayConfig;

/// Environment variable naming the TOML configuration file.
pub const CONFIG_PATH_ENV: &str = "TL_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HubConfig {
    pub storage: StorageConfig,
    pub log: LogConfig,
    pub signing: SigningConfig,
    pub pipeline: PipelineConfig,
    pub duplicates: DuplicateConfig,
    pub gateway: GatewayConfig,
    pub clients: ClientsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    RocksDb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordBackend {
    /// Same key-value store as the log
    #[default]
    Kv,
    /// Files under `<data_dir>/records`
    Files,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub records: RecordBackend,
    pub data_dir: PathBuf,
    /// fsync every batch (RocksDB only)
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            records: RecordBackend::Kv,
            data_dir: PathBuf::from("./data"),
            sync_writes: true,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SigningConfig {
    /// 32-byte secp256k1 secret, hex. A fresh key is generated when absent.
    pub key_hex: Option<String>,
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("key_hex", &self.key_hex.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateConfig {
    /// Keep reservations as marker files under `<data_dir>/duplicates`
    pub persistent: bool,
    /// Lifetime of in-memory reservations
    pub ttl_secs: i64,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            persistent: false,
            ttl_secs: DEFAULT_DUPLICATE_TTL_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClientsConfig {
    /// JSON array of registrations, re-read on every registry refresh
    pub file: Option<PathBuf>,
    /// Inline registrations, used when `file` is absent
    pub registrations: Vec<ClientRegistration>,
}

#[derive(Debug, Error)]
pub enum HubConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid value for {name}: {value}")]
    Env { name: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl HubConfig {
    /// Load from `TL_CONFIG` (if set), apply environment overrides, validate.
    pub fn load() -> Result<Self, HubConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, HubConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| HubConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|e| HubConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Overlay `TL_*` variables looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), HubConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("TL_LISTEN_ADDR") {
            self.gateway.listen_addr = parse_env("TL_LISTEN_ADDR", value)?;
        }
        if let Some(value) = lookup("TL_AUDIENCE") {
            self.gateway.audience = value;
        }
        if let Some(value) = lookup("TL_RETRY_AFTER_SECS") {
            self.gateway.retry_after_secs = parse_env("TL_RETRY_AFTER_SECS", value)?;
        }
        if let Some(value) = lookup("TL_QUEUE_CAPACITY") {
            self.pipeline.queue_capacity = parse_env("TL_QUEUE_CAPACITY", value)?;
        }
        if let Some(value) = lookup("TL_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("TL_STORAGE") {
            self.storage.backend = match value.to_ascii_lowercase().as_str() {
                "memory" => StorageBackend::Memory,
                "rocksdb" => StorageBackend::RocksDb,
                _ => {
                    return Err(HubConfigError::Env {
                        name: "TL_STORAGE",
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup("TL_SIGNING_KEY") {
            self.signing.key_hex = Some(value);
        }
        if let Some(value) = lookup("TL_CLIENTS_FILE") {
            self.clients.file = Some(PathBuf::from(value));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), HubConfigError> {
        self.gateway
            .validate()
            .map_err(|e| HubConfigError::Invalid(format!("gateway: {}", e)))?;
        self.pipeline
            .validate()
            .map_err(|e| HubConfigError::Invalid(format!("pipeline: {}", e)))?;
        if self.duplicates.ttl_secs <= 0 {
            return Err(HubConfigError::Invalid(
                "duplicates.ttl_secs must be positive".into(),
            ));
        }
        if self.log.bucket.is_empty() {
            return Err(HubConfigError::Invalid("log.bucket cannot be empty".into()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, HubConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| HubConfigError::Env { name, value })
}
