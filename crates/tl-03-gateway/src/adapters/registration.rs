//! Registration sources: fixed list and JSON file.

use async_trait::async_trait;
use std::path::PathBuf;
use tl_02_ingestion::ClientRegistration;
use tracing::debug;

use crate::domain::error::GatewayError;
use crate::ports::outbound::RegistrationSource;

/// Registrations fixed at construction (configuration file, tests).
#[derive(Debug, Clone, Default)]
pub struct StaticRegistrationSource {
    registrations: Vec<ClientRegistration>,
}

impl StaticRegistrationSource {
    pub fn new(registrations: Vec<ClientRegistration>) -> Self {
        Self { registrations }
    }
}

#[async_trait]
impl RegistrationSource for StaticRegistrationSource {
    async fn load(&self) -> Result<Vec<ClientRegistration>, GatewayError> {
        Ok(self.registrations.clone())
    }
}

/// Registrations read from a JSON array on every load, so edits to the file
/// are picked up by the next refresh.
#[derive(Debug, Clone)]
pub struct FileRegistrationSource {
    path: PathBuf,
}

impl FileRegistrationSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RegistrationSource for FileRegistrationSource {
    async fn load(&self) -> Result<Vec<ClientRegistration>, GatewayError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            GatewayError::Registry(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let registrations: Vec<ClientRegistration> = serde_json::from_slice(&bytes)
            .map_err(|e| {
                GatewayError::Registry(format!("cannot parse {}: {}", self.path.display(), e))
            })?;
        debug!(path = %self.path.display(), count = registrations.len(), "Loaded client registrations");
        Ok(registrations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tl_02_ingestion::SignatureAlgorithm;

    #[tokio::test]
    async fn test_file_source_reads_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.json");
        std::fs::write(
            &path,
            r#"[{"client_id":"c1","algorithm":"HS256","secret":"c2VjcmV0","key_id":"k1"}]"#,
        )
        .unwrap();

        let loaded = FileRegistrationSource::new(&path).load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].client_id, "c1");
        assert_eq!(loaded[0].algorithm, SignatureAlgorithm::HS256);
    }

    #[tokio::test]
    async fn test_file_source_reports_missing_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = FileRegistrationSource::new(dir.path().join("nope.json"));
        assert!(matches!(missing.load().await, Err(GatewayError::Registry(_))));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let invalid = FileRegistrationSource::new(path);
        assert!(matches!(invalid.load().await, Err(GatewayError::Registry(_))));
    }
}
