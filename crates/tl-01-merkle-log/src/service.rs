//! # Merkle Log Service
//!
//! Owns tree state and implements [`MerkleLogApi`].
//!
//! ## Append (frontier walk)
//!
//! The tree for `n` leaves decomposes into one full subtree per set bit of
//! `n`. Appending walks the right spine from the root, stacking left
//! children, until it reaches the smallest full subtree; the new leaf is
//! merged with it and the stack is folded back up. Merges continue only
//! through saturated levels, like carry propagation in binary addition.
//!
//! ```text
//! n = 6 (0b110)           n = 7 (0b111)
//!
//!        R                       R'
//!      /   \                   /    \
//!   [0..4) [4..6)          [0..4)    X
//!                                  /   \
//!                              [4..6)  leaf6
//! ```
//!
//! All nodes, the leaf and the new head of one append are committed in a
//! single [`UnitOfWork`]; a failure leaves the previous head in force.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::entities::{MerkleNode, SignedTreeHead};
use crate::domain::errors::MerkleTreeError;
use crate::domain::hasher::{HashAlgorithm, MerkleHash, MerkleHasher};
use crate::domain::proofs::{consistency_path, hash_full, inclusion_path, LeafSource};
use crate::ports::inbound::MerkleLogApi;
use crate::ports::outbound::{LogStorage, MerkleSigner, UnitOfWork};

/// Log configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Hash algorithm; fixed for the life of the log.
    pub algorithm: HashAlgorithm,
    /// Partition identifier stamped on every tree head.
    pub bucket: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Sha256,
            bucket: "default".to_string(),
        }
    }
}

pub struct MerkleLogService<S: LogStorage> {
    storage: Arc<S>,
    signer: Arc<dyn MerkleSigner>,
    hasher: MerkleHasher,
    bucket: String,
    /// Single-writer discipline for appends.
    append_lock: Mutex<()>,
}

impl<S: LogStorage> MerkleLogService<S> {
    pub fn new(storage: Arc<S>, signer: Arc<dyn MerkleSigner>, config: LogConfig) -> Self {
        Self {
            storage,
            signer,
            hasher: MerkleHasher::new(config.algorithm),
            bucket: config.bucket,
            append_lock: Mutex::new(()),
        }
    }

    pub fn hasher(&self) -> &MerkleHasher {
        &self.hasher
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    fn require_node(&self, hash: &MerkleHash) -> Result<MerkleNode, MerkleTreeError> {
        self.storage
            .node(hash)?
            .ok_or_else(|| MerkleTreeError::corrupted(format!("node {} missing", hash)))
    }

    fn sign_head(&self, root: &MerkleNode, tree_size: u64) -> Result<SignedTreeHead, MerkleTreeError> {
        let signature = self.signer.sign(&root.hash)?;
        Ok(SignedTreeHead {
            root_hash: root.hash.clone(),
            tree_size,
            level: root.level,
            signature,
            bucket: self.bucket.clone(),
        })
    }

    fn current_size(&self) -> Result<u64, MerkleTreeError> {
        Ok(self
            .storage
            .latest_head()?
            .map(|head| head.tree_size)
            .unwrap_or(0))
    }

    fn ensure_committed(&self, name: &'static str, tree_size: u64) -> Result<u64, MerkleTreeError> {
        let current = self.current_size()?;
        if tree_size > current {
            return Err(MerkleTreeError::OutOfRange {
                name,
                value: tree_size,
                limit: current,
            });
        }
        Ok(current)
    }

    /// New nodes produced by merging `leaf` into the tree under `root`,
    /// bottom-up. The last element is the new root.
    fn merge_leaf(&self, root: MerkleNode, leaf: &MerkleNode) -> Result<Vec<MerkleNode>, MerkleTreeError> {
        if root.is_full {
            return Ok(vec![MerkleNode::parent(&self.hasher, &root, leaf)]);
        }

        let mut stack = Vec::new();
        let mut current = root;
        while !current.is_full {
            let (left, right) = current.children.as_ref().ok_or_else(|| {
                MerkleTreeError::corrupted(format!("non-full node {} has no children", current.hash))
            })?;
            stack.push(self.require_node(left)?);
            current = self.require_node(right)?;
        }
        stack.push(current);
        stack.push(leaf.clone());

        let mut created = Vec::new();
        while stack.len() > 1 {
            let (Some(right), Some(left)) = (stack.pop(), stack.pop()) else {
                break;
            };
            let parent = MerkleNode::parent(&self.hasher, &left, &right);
            created.push(parent.clone());
            stack.push(parent);
        }
        Ok(created)
    }
}

/// Leaf access over committed storage.
struct StoredLeaves<'a, S: LogStorage> {
    storage: &'a S,
}

impl<S: LogStorage> LeafSource for StoredLeaves<'_, S> {
    fn leaf_hash(&self, index: u64) -> Result<MerkleHash, MerkleTreeError> {
        self.storage
            .leaf(index)?
            .ok_or_else(|| MerkleTreeError::corrupted(format!("leaf {} missing", index)))
    }
}

impl<S: LogStorage> MerkleLogApi for MerkleLogService<S> {
    fn append(&self, data: &[u8]) -> Result<SignedTreeHead, MerkleTreeError> {
        let _guard = self.append_lock.lock();

        let leaf = MerkleNode::leaf(self.hasher.hash_leaf(data));

        let Some(head) = self.storage.latest_head()? else {
            let sth = self.sign_head(&leaf, 1)?;
            let mut work = UnitOfWork::new();
            work.add_leaf(0, leaf.hash.clone());
            work.add_node(leaf);
            work.add_head(sth.clone());
            self.storage.commit(work)?;
            debug!(tree_size = 1, root = %sth.root_hash, "Created tree");
            return Ok(sth);
        };

        if let Some(index) = self.storage.leaf_index(&leaf.hash)? {
            info!(
                leaf = %leaf.hash,
                index,
                tree_size = head.tree_size,
                "Leaf already present, returning current tree head"
            );
            return Ok(head);
        }

        let root = self.require_node(&head.root_hash)?;
        let created = self.merge_leaf(root, &leaf)?;
        let new_root = created
            .last()
            .ok_or_else(|| MerkleTreeError::corrupted("merge produced no root"))?;

        let tree_size = head.tree_size + 1;
        let sth = self.sign_head(new_root, tree_size)?;

        let mut work = UnitOfWork::new();
        work.add_leaf(head.tree_size, leaf.hash.clone());
        work.add_node(leaf);
        for node in created {
            work.add_node(node);
        }
        work.add_head(sth.clone());
        self.storage.commit(work)?;

        debug!(tree_size, level = sth.level, root = %sth.root_hash, "Appended leaf");
        Ok(sth)
    }

    fn tree_size(&self) -> Result<u64, MerkleTreeError> {
        self.current_size()
    }

    fn latest_head(&self) -> Result<Option<SignedTreeHead>, MerkleTreeError> {
        self.storage.latest_head()
    }

    fn tree_head(&self, tree_size: u64) -> Result<Option<SignedTreeHead>, MerkleTreeError> {
        self.storage.head(tree_size)
    }

    fn root_hash(&self, tree_size: u64) -> Result<MerkleHash, MerkleTreeError> {
        self.ensure_committed("tree size", tree_size)?;
        let leaves = StoredLeaves {
            storage: self.storage.as_ref(),
        };
        hash_full(&self.hasher, &leaves, 0, tree_size)
    }

    fn inclusion_proof(
        &self,
        leaf_index: u64,
        tree_size: u64,
    ) -> Result<Vec<MerkleHash>, MerkleTreeError> {
        self.ensure_committed("tree size", tree_size)?;
        if leaf_index >= tree_size {
            return Err(MerkleTreeError::OutOfRange {
                name: "leaf index",
                value: leaf_index,
                limit: tree_size,
            });
        }

        let leaves = StoredLeaves {
            storage: self.storage.as_ref(),
        };
        inclusion_path(&self.hasher, &leaves, leaf_index, 0, tree_size)
    }

    fn consistency_proof(
        &self,
        tree_size1: u64,
        tree_size2: u64,
    ) -> Result<Vec<MerkleHash>, MerkleTreeError> {
        if tree_size1 > tree_size2 {
            return Err(MerkleTreeError::InvalidRange {
                first: tree_size1,
                second: tree_size2,
            });
        }
        self.ensure_committed("tree size", tree_size2)?;

        if tree_size1 == tree_size2 || tree_size1 == 0 {
            return Ok(Vec::new());
        }

        let leaves = StoredLeaves {
            storage: self.storage.as_ref(),
        };
        consistency_path(&self.hasher, &leaves, tree_size1, 0, tree_size2, true)
    }

    fn leaf_index(&self, leaf_hash: &MerkleHash) -> Result<Option<u64>, MerkleTreeError> {
        self.storage.leaf_index(leaf_hash)
    }

    fn frontier(&self) -> Result<Vec<MerkleNode>, MerkleTreeError> {
        let Some(head) = self.storage.latest_head()? else {
            return Ok(Vec::new());
        };

        let mut frontier = Vec::new();
        let mut current = self.require_node(&head.root_hash)?;
        while !current.is_full {
            let (left, right) = current.children.as_ref().ok_or_else(|| {
                MerkleTreeError::corrupted(format!("non-full node {} has no children", current.hash))
            })?;
            frontier.push(self.require_node(left)?);
            current = self.require_node(right)?;
        }
        frontier.push(current);
        Ok(frontier)
    }

    fn verify_integrity(&self) -> Result<bool, MerkleTreeError> {
        let Some(head) = self.storage.latest_head()? else {
            return Ok(true);
        };

        let leaves = self.storage.leaves()?;
        if leaves.len() as u64 != head.tree_size {
            warn!(
                stored = leaves.len(),
                tree_size = head.tree_size,
                "Leaf count does not match tree head"
            );
            return Ok(false);
        }

        // Fold leaves left to right with a stack of (hash, leaf count), merging
        // equal-width neighbours; what remains is folded right to left.
        let mut stack: Vec<(MerkleHash, u64)> = Vec::new();
        for leaf in leaves {
            let mut node = (leaf, 1u64);
            while let Some((_, width)) = stack.last() {
                if *width != node.1 {
                    break;
                }
                let Some((left, width)) = stack.pop() else {
                    break;
                };
                node = (self.hasher.hash_node(&left, &node.0), width * 2);
            }
            stack.push(node);
        }

        let mut root = None;
        while let Some((hash, _)) = stack.pop() {
            root = Some(match root {
                None => hash,
                Some(right) => self.hasher.hash_node(&hash, &right),
            });
        }

        let valid = root.as_ref() == Some(&head.root_hash);
        if !valid {
            warn!(
                tree_size = head.tree_size,
                stored_root = %head.root_hash,
                "Recomputed root does not match tree head"
            );
        }
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{EcdsaTreeSigner, InMemoryKVStore, KvLogStorage};
    use crate::domain::errors::SignerError;
    use crate::domain::test_vectors::*;
    use crate::domain::verifier::{TreeVerifier, VerificationResult};

    type MemoryLog = MerkleLogService<KvLogStorage<InMemoryKVStore>>;

    // ========== Test Helpers ==========

    fn new_log() -> MemoryLog {
        let storage = Arc::new(KvLogStorage::new(Arc::new(InMemoryKVStore::new()), "log"));
        MerkleLogService::new(
            storage,
            Arc::new(EcdsaTreeSigner::from_bytes([1u8; 32]).unwrap()),
            LogConfig::default(),
        )
    }

    fn vector_log() -> MemoryLog {
        let log = new_log();
        for i in 0..LEAVES.len() {
            log.append(&leaf_data(i)).unwrap();
        }
        log
    }

    fn byte_leaf(i: u8) -> Vec<u8> {
        let mut data = vec![0u8; 32];
        data[0] = i;
        data
    }

    struct FailingSigner;

    impl MerkleSigner for FailingSigner {
        fn sign(&self, _digest: &MerkleHash) -> Result<Vec<u8>, SignerError> {
            Err(SignerError::KeyUnavailable("hsm offline".into()))
        }
    }

    // ========== Test Group 1: Append ==========

    #[test]
    fn test_first_append_creates_level_zero_head() {
        let log = new_log();
        let head = log.append(&leaf_data(0)).unwrap();

        assert_eq!(head.tree_size, 1);
        assert_eq!(head.level, 0);
        assert_eq!(head.root_hash, hash(ROOTS[0]));
        assert_eq!(head.bucket, "default");
        assert!(!head.signature.is_empty());
    }

    #[test]
    fn test_incremental_append_matches_root_vectors() {
        let log = new_log();
        for i in 0..LEAVES.len() {
            let head = log.append(&leaf_data(i)).unwrap();
            let size = i as u64 + 1;
            assert_eq!(head.tree_size, size);
            assert_eq!(head.root_hash, hash(ROOTS[i]), "root at size {}", size);
            assert_eq!(log.root_hash(size).unwrap(), head.root_hash);
        }
    }

    #[test]
    fn test_root_level_is_ceil_log2() {
        let log = new_log();
        for i in 0u8..85 {
            let head = log.append(&byte_leaf(i)).unwrap();
            let size = i as u64 + 1;
            let expected = 64 - (size - 1).leading_zeros();
            assert_eq!(head.level, expected, "level at size {}", size);
        }
    }

    #[test]
    fn test_every_stored_node_hashes_its_children() {
        let log = new_log();
        for i in 0u8..85 {
            log.append(&byte_leaf(i)).unwrap();
        }

        for size in 1..=85u64 {
            let head = log.tree_head(size).unwrap().unwrap();
            let mut pending = vec![log.require_node(&head.root_hash).unwrap()];
            while let Some(node) = pending.pop() {
                if let Some((left, right)) = &node.children {
                    let left = log.require_node(left).unwrap();
                    let right = log.require_node(right).unwrap();
                    assert_eq!(node.hash, log.hasher().hash_node(&left.hash, &right.hash));
                    assert!(node.level > left.level && node.level > right.level);
                    pending.push(left);
                    pending.push(right);
                }
            }
        }
    }

    #[test]
    fn test_duplicate_leaf_returns_existing_head() {
        let log = new_log();
        log.append(b"first").unwrap();
        let head = log.append(b"second").unwrap();

        let again = log.append(b"first").unwrap();
        assert_eq!(again, head);
        assert_eq!(log.tree_size().unwrap(), 2);
    }

    #[test]
    fn test_signing_failure_leaves_tree_untouched() {
        let storage = Arc::new(KvLogStorage::new(Arc::new(InMemoryKVStore::new()), "log"));
        let log = MerkleLogService::new(storage, Arc::new(FailingSigner), LogConfig::default());

        let err = log.append(b"leaf").unwrap_err();
        assert!(matches!(err, MerkleTreeError::Signing(_)));
        assert_eq!(log.tree_size().unwrap(), 0);
        assert!(log.storage().leaves().unwrap().is_empty());
    }

    #[test]
    fn test_frontier_has_one_subtree_per_set_bit() {
        let log = new_log();
        for i in 0u8..23 {
            log.append(&byte_leaf(i)).unwrap();
            let size = i as u64 + 1;
            let frontier = log.frontier().unwrap();
            assert_eq!(frontier.len() as u32, size.count_ones());
            assert!(frontier.iter().all(|n| n.is_full));
        }
    }

    // ========== Test Group 2: Proofs ==========

    #[test]
    fn test_inclusion_proof_vectors() {
        let log = vector_log();
        for (leaf, size, expected) in inclusion_vectors() {
            assert_eq!(log.inclusion_proof(leaf, size).unwrap(), expected);
        }
    }

    #[test]
    fn test_consistency_proof_vectors() {
        let log = vector_log();
        for (first, second, expected) in consistency_vectors() {
            assert_eq!(log.consistency_proof(first, second).unwrap(), expected);
        }
    }

    #[test]
    fn test_inclusion_proof_rejects_bad_indices() {
        let log = vector_log();
        for (leaf, size) in [(0, 11), (11, 7), (8, 8)] {
            let err = log.inclusion_proof(leaf, size).unwrap_err();
            assert!(err.is_range_error(), "({}, {})", leaf, size);
        }
    }

    #[test]
    fn test_consistency_proof_rejects_bad_indices() {
        let log = vector_log();
        for (first, second) in [(1, 11), (7, 5)] {
            let err = log.consistency_proof(first, second).unwrap_err();
            assert!(err.is_range_error(), "({}, {})", first, second);
        }
    }

    #[test]
    fn test_root_hash_rejects_uncommitted_size() {
        let log = vector_log();
        assert!(log.root_hash(9).unwrap_err().is_range_error());
        assert_eq!(log.root_hash(0).unwrap(), log.hasher().hash_empty());
    }

    #[test]
    fn test_generated_proofs_verify() {
        let log = new_log();
        let verifier = TreeVerifier::new(*log.hasher());
        for i in 0u8..16 {
            log.append(&[i; 32]).unwrap();
        }

        for size in 1..=16u64 {
            let head = log.tree_head(size).unwrap().unwrap();
            for j in 0..size {
                let leaf = log.hasher().hash_leaf(&[j as u8; 32]);
                let proof = log.inclusion_proof(j, size).unwrap();
                assert_eq!(
                    verifier.verify_inclusion(&leaf, j, &proof, &head).unwrap(),
                    VerificationResult::Success
                );
            }
            for j in 0..=size {
                let old_root = log.root_hash(j).unwrap();
                let proof = log.consistency_proof(j, size).unwrap();
                assert_eq!(
                    verifier
                        .verify_consistency(j, size, &old_root, &head.root_hash, &proof)
                        .unwrap(),
                    VerificationResult::Success,
                    "consistency ({}, {})",
                    j,
                    size
                );
            }
        }
    }

    // ========== Test Group 3: Integrity ==========

    #[test]
    fn test_verify_integrity_on_empty_and_populated_tree() {
        let log = new_log();
        assert!(log.verify_integrity().unwrap());

        for i in 0u8..85 {
            log.append(&byte_leaf(i)).unwrap();
        }
        assert!(log.verify_integrity().unwrap());
    }

    #[test]
    fn test_verify_integrity_detects_tampered_leaf() {
        use crate::ports::outbound::{BatchOperation, KeyValueStore};

        let log = vector_log();
        let mut key = b"log/leaf/".to_vec();
        key.extend_from_slice(&3u64.to_be_bytes());
        log.storage()
            .store()
            .atomic_batch_write(vec![BatchOperation::put(key, vec![0u8; 32])])
            .unwrap();

        assert!(!log.verify_integrity().unwrap());
    }

    #[test]
    fn test_head_signature_verifies() {
        let signer = EcdsaTreeSigner::from_bytes([1u8; 32]).unwrap();
        let log = vector_log();
        let head = log.latest_head().unwrap().unwrap();
        assert!(signer.verify(&head.root_hash, &head.signature));
    }
}
