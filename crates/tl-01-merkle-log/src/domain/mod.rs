//! Domain layer: pure tree logic with no storage access.

pub mod entities;
pub mod errors;
pub mod hasher;
pub mod proofs;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_vectors;

pub use entities::*;
pub use errors::*;
pub use hasher::*;
pub use proofs::*;
pub use verifier::*;
