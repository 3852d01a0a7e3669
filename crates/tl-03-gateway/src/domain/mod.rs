//! Domain layer: configuration and error mapping.

pub mod config;
pub mod error;

pub use config::{ClientCredential, ConfigError, GatewayConfig};
pub use error::{ErrorResponse, GatewayError, Rejection};
