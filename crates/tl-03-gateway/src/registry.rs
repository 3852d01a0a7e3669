//! # Client Registry
//!
//! Maps authenticated client ids to their validation policy.
//!
//! Lookups read an immutable snapshot; a refresh builds a complete new map
//! and swaps the pointer, so readers never observe a half-built registry and
//! never wait on a rebuild.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tl_02_ingestion::ValidationPolicy;
use tracing::{debug, info, warn};

use crate::domain::error::GatewayError;
use crate::ports::outbound::RegistrationSource;

type Snapshot = Arc<HashMap<String, ValidationPolicy>>;

pub struct ClientRegistry {
    source: Arc<dyn RegistrationSource>,
    audience: String,
    snapshot: RwLock<Snapshot>,
}

impl ClientRegistry {
    /// Load the initial snapshot. Fails if the source cannot be read.
    pub async fn load(
        source: Arc<dyn RegistrationSource>,
        audience: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let registry = Self {
            source,
            audience: audience.into(),
            snapshot: RwLock::new(Arc::new(HashMap::new())),
        };
        registry.refresh().await?;
        Ok(registry)
    }

    /// Rebuild the snapshot from the source. Returns the number of clients.
    ///
    /// Registrations whose key material is unusable are skipped with a
    /// warning rather than failing the whole refresh.
    pub async fn refresh(&self) -> Result<usize, GatewayError> {
        let registrations = self.source.load().await?;

        let mut policies = HashMap::with_capacity(registrations.len());
        for registration in registrations {
            match registration.build_policy(&self.audience) {
                Ok(policy) => {
                    policies.insert(registration.client_id, policy);
                }
                Err(e) => warn!(client = %registration.client_id, error = %e, "Skipping client registration"),
            }
        }

        let count = policies.len();
        *self.snapshot.write() = Arc::new(policies);
        info!(clients = count, "Client registry refreshed");
        Ok(count)
    }

    /// Policy from the current snapshot only.
    pub fn policy(&self, client_id: &str) -> Option<ValidationPolicy> {
        let snapshot: Snapshot = self.snapshot.read().clone();
        snapshot.get(client_id).cloned()
    }

    /// Policy for `client_id`, refreshing once on a miss.
    pub async fn resolve(&self, client_id: &str) -> Option<ValidationPolicy> {
        if let Some(policy) = self.policy(client_id) {
            return Some(policy);
        }

        debug!(client = client_id, "Unknown client, refreshing registry");
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Registry refresh failed");
            return None;
        }
        self.policy(client_id)
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
