//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the log engine requires from the host application: a storage
//! backend for nodes, leaves and tree heads, and a tree head signer.

use crate::domain::entities::{MerkleNode, SignedTreeHead};
use crate::domain::errors::{KVStoreError, MerkleTreeError, SignerError};
use crate::domain::hasher::MerkleHash;

/// Abstract interface for ordered key-value database operations.
///
/// Production: `RocksDbStore` (feature `rocksdb`)
/// Testing: `InMemoryKVStore`
///
/// Implementations use interior locking so readers proceed while a writer
/// commits a batch.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch are applied, or NONE are.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// All entries whose key starts with `prefix`, in ascending key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Everything one append writes. Committed as a single atomic unit.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    pub nodes: Vec<MerkleNode>,
    /// `(index, leaf_hash)`
    pub leaves: Vec<(u64, MerkleHash)>,
    pub heads: Vec<SignedTreeHead>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: MerkleNode) {
        self.nodes.push(node);
    }

    pub fn add_leaf(&mut self, index: u64, hash: MerkleHash) {
        self.leaves.push((index, hash));
    }

    pub fn add_head(&mut self, head: SignedTreeHead) {
        self.heads.push(head);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.leaves.is_empty() && self.heads.is_empty()
    }
}

/// Storage capability for the log engine.
///
/// The engine never assumes a query language; every access is a point lookup
/// or an ordered scan, and every mutation goes through [`LogStorage::commit`].
pub trait LogStorage: Send + Sync {
    /// Node by hash.
    fn node(&self, hash: &MerkleHash) -> Result<Option<MerkleNode>, MerkleTreeError>;

    /// Leaf hash by sequence index.
    fn leaf(&self, index: u64) -> Result<Option<MerkleHash>, MerkleTreeError>;

    /// Sequence index of a leaf hash, if appended.
    fn leaf_index(&self, hash: &MerkleHash) -> Result<Option<u64>, MerkleTreeError>;

    /// All leaf hashes in append order.
    fn leaves(&self) -> Result<Vec<MerkleHash>, MerkleTreeError>;

    /// Tree head committed at `tree_size`.
    fn head(&self, tree_size: u64) -> Result<Option<SignedTreeHead>, MerkleTreeError>;

    /// Most recent tree head.
    fn latest_head(&self) -> Result<Option<SignedTreeHead>, MerkleTreeError>;

    /// Atomically apply a unit of work.
    fn commit(&self, work: UnitOfWork) -> Result<(), MerkleTreeError>;
}

/// Signs tree head digests. Failure aborts the append that requested it.
pub trait MerkleSigner: Send + Sync {
    /// Detached signature over a 32, 48 or 64-byte digest.
    fn sign(&self, digest: &MerkleHash) -> Result<Vec<u8>, SignerError>;
}
