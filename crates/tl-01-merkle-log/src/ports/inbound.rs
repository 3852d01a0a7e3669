//! # Inbound Ports (Driving Ports)
//!
//! API the log engine exposes to the ingestion pipeline and to proof
//! servers.

use crate::domain::entities::{MerkleNode, SignedTreeHead};
use crate::domain::errors::MerkleTreeError;
use crate::domain::hasher::MerkleHash;

/// Merkle transparency log API.
///
/// Reads always answer for an already-committed tree size and are safe to
/// run concurrently with an append.
pub trait MerkleLogApi: Send + Sync {
    /// Append a leaf and return the new signed tree head.
    ///
    /// Appending content whose leaf hash already exists returns the latest
    /// head unchanged.
    fn append(&self, data: &[u8]) -> Result<SignedTreeHead, MerkleTreeError>;

    /// Number of committed leaves.
    fn tree_size(&self) -> Result<u64, MerkleTreeError>;

    fn latest_head(&self) -> Result<Option<SignedTreeHead>, MerkleTreeError>;

    /// Head committed at exactly `tree_size`.
    fn tree_head(&self, tree_size: u64) -> Result<Option<SignedTreeHead>, MerkleTreeError>;

    /// Root hash of the first `tree_size` leaves.
    fn root_hash(&self, tree_size: u64) -> Result<MerkleHash, MerkleTreeError>;

    /// Audit path for `leaf_index` in the tree of `tree_size`.
    fn inclusion_proof(
        &self,
        leaf_index: u64,
        tree_size: u64,
    ) -> Result<Vec<MerkleHash>, MerkleTreeError>;

    /// Proof that the tree of `tree_size1` is a prefix of the tree of `tree_size2`.
    fn consistency_proof(
        &self,
        tree_size1: u64,
        tree_size2: u64,
    ) -> Result<Vec<MerkleHash>, MerkleTreeError>;

    /// Sequence index of a previously appended leaf hash.
    fn leaf_index(&self, leaf_hash: &MerkleHash) -> Result<Option<u64>, MerkleTreeError>;

    /// Full subtree roots covering the current tree, left to right.
    fn frontier(&self) -> Result<Vec<MerkleNode>, MerkleTreeError>;

    /// Recompute the root from stored leaves and compare with the latest head.
    fn verify_integrity(&self) -> Result<bool, MerkleTreeError>;
}
