//! Domain layer: records, policies and the error taxonomy.

pub mod entities;
pub mod errors;
pub mod policy;

pub use entities::*;
pub use errors::*;
pub use policy::*;
