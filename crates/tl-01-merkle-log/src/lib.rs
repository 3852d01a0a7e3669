//! # Merkle Transparency Log
//!
//! Append-only, cryptographically verifiable log of audit records.
//!
//! ## Architecture
//!
//! ```text
//!                  ┌────────────────────────────┐
//!   append(data) ─→│     MerkleLogService       │──sign(root)──→ MerkleSigner
//!                  │  (single-writer append)    │
//!   proofs ←───────│  hash_full / paths (pure)  │
//!                  └─────────────┬──────────────┘
//!                                │ UnitOfWork (atomic)
//!                                ↓
//!                  ┌────────────────────────────┐
//!                  │  LogStorage (KvLogStorage) │
//!                  └─────────────┬──────────────┘
//!                                ↓
//!                  InMemoryKVStore | RocksDbStore
//! ```
//!
//! [`TreeVerifier`] checks proofs against a trusted [`SignedTreeHead`] without
//! any storage access.
//!
//! ## Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | `tree_size` grows by exactly 1 per append | `MerkleLogService::append` |
//! | Leaves are never reordered or removed | leaves keyed by index, written once |
//! | `hash = H(0x01 ‖ left ‖ right)` for interior nodes | `MerkleNode::parent` |
//! | One head per tree size | heads keyed by size |
//! | No partial append visible to readers | single atomic batch per append |
//! | Appends are serialized | `append_lock` |

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{verify_tree_head_signature, EcdsaTreeSigner, InMemoryKVStore, KvLogStorage};
#[cfg(feature = "rocksdb")]
pub use adapters::{RocksDbConfig, RocksDbStore};
pub use domain::{
    HashAlgorithm, KVStoreError, MerkleHash, MerkleHasher, MerkleNode, MerkleTreeError,
    SignedTreeHead, SignerError, TreeVerifier, VerificationResult,
};
pub use ports::{
    BatchOperation, KeyValueStore, LogStorage, MerkleLogApi, MerkleSigner, UnitOfWork,
};
pub use service::{LogConfig, MerkleLogService};
