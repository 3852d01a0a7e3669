//! Adapters: registration sources.

pub mod registration;

pub use registration::{FileRegistrationSource, StaticRegistrationSource};
