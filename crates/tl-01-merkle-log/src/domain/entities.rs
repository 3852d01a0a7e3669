//! Core tree entities: nodes and signed tree heads.

use serde::{Deserialize, Serialize};

use super::hasher::{MerkleHash, MerkleHasher};

/// A subtree of the log. Immutable once its hash is computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleNode {
    pub hash: MerkleHash,
    /// Height above the leaves (leaves are level 0).
    pub level: u32,
    /// `(left, right)` child hashes; `None` for leaves.
    pub children: Option<(MerkleHash, MerkleHash)>,
    /// True iff the subtree covers exactly `2^level` leaves.
    pub is_full: bool,
}

impl MerkleNode {
    /// A leaf node. Leaves are always full.
    pub fn leaf(hash: MerkleHash) -> Self {
        Self {
            hash,
            level: 0,
            children: None,
            is_full: true,
        }
    }

    /// Combine two subtrees into their parent.
    pub fn parent(hasher: &MerkleHasher, left: &MerkleNode, right: &MerkleNode) -> Self {
        Self {
            hash: hasher.hash_node(&left.hash, &right.hash),
            level: left.level + 1,
            children: Some((left.hash.clone(), right.hash.clone())),
            is_full: left.level == right.level && left.is_full && right.is_full,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// A signed commitment to the root hash at a given tree size.
///
/// Exactly one head exists per tree size; heads are never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTreeHead {
    pub root_hash: MerkleHash,
    /// Number of leaves committed.
    pub tree_size: u64,
    /// Height of the root node.
    pub level: u32,
    /// Detached signature over `root_hash`.
    pub signature: Vec<u8>,
    /// Log partition identifier.
    pub bucket: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(hasher: &MerkleHasher, data: &[u8]) -> MerkleNode {
        MerkleNode::leaf(hasher.hash_leaf(data))
    }

    #[test]
    fn test_parent_of_two_leaves_is_full() {
        let hasher = MerkleHasher::default();
        let node = MerkleNode::parent(&hasher, &leaf(&hasher, b"a"), &leaf(&hasher, b"b"));

        assert_eq!(node.level, 1);
        assert!(node.is_full);
        assert!(!node.is_leaf());
    }

    #[test]
    fn test_parent_of_unequal_levels_is_not_full() {
        let hasher = MerkleHasher::default();
        let pair = MerkleNode::parent(&hasher, &leaf(&hasher, b"a"), &leaf(&hasher, b"b"));
        let node = MerkleNode::parent(&hasher, &pair, &leaf(&hasher, b"c"));

        assert_eq!(node.level, 2);
        assert!(!node.is_full);
    }

    #[test]
    fn test_parent_hash_is_node_hash_of_children() {
        let hasher = MerkleHasher::default();
        let left = leaf(&hasher, b"a");
        let right = leaf(&hasher, b"b");
        let node = MerkleNode::parent(&hasher, &left, &right);

        assert_eq!(node.hash, hasher.hash_node(&left.hash, &right.hash));
        assert_eq!(node.children, Some((left.hash, right.hash)));
    }
}
