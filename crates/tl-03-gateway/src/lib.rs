//! # Security-Event Gateway
//!
//! HTTP front end for token submission.
//!
//! ## Architecture
//!
//! ```text
//!  POST /events ──→ content negotiation (415 / 406)
//!                     │
//!                     ↓
//!                  ApiKeyAuthenticator ──→ 401
//!                     │ client_id
//!                     ↓
//!                  ClientRegistry (snapshot, refresh on miss) ──→ 403
//!                     │ ValidationPolicy
//!                     ↓
//!                  IngestionApi::submit ──→ 202 | 400 | 429
//! ```
//!
//! ## Error body
//!
//! `{"err": "invalid_request" | "invalid_key" | "authentication_failed" | "access_denied", "description"?: "..."}`

pub mod adapters;
pub mod auth;
pub mod domain;
pub mod ports;
pub mod registry;
pub mod router;
pub mod service;

pub use adapters::{FileRegistrationSource, StaticRegistrationSource};
pub use auth::ApiKeyAuthenticator;
pub use domain::{ClientCredential, ConfigError, ErrorResponse, GatewayConfig, GatewayError, Rejection};
pub use ports::RegistrationSource;
pub use registry::ClientRegistry;
pub use router::{build_router, GatewayState, SECEVENT_CONTENT_TYPE};
pub use service::{GatewayService, RunningGateway};
