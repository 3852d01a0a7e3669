//! # Outbound Ports (Driven Ports)

use async_trait::async_trait;
use tl_02_ingestion::ClientRegistration;

use crate::domain::error::GatewayError;

/// Where client registrations come from.
///
/// Called at startup and again whenever an authenticated client is not in
/// the current registry snapshot.
#[async_trait]
pub trait RegistrationSource: Send + Sync {
    async fn load(&self) -> Result<Vec<ClientRegistration>, GatewayError>;
}
