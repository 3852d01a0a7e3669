//! # Range Hashing and Proof Paths
//!
//! Pure recursive functions over a virtual leaf range `[start, end)`. They
//! read leaf hashes through a [`LeafSource`] and never consult materialized
//! interior nodes, so proofs can be served for any historical tree size.
//!
//! Every split uses `k`, the largest power of two strictly below the range
//! width, which reproduces the RFC 6962 tree shape.

use super::errors::MerkleTreeError;
use super::hasher::{MerkleHash, MerkleHasher};

/// Read access to leaf hashes by sequence index.
pub trait LeafSource {
    fn leaf_hash(&self, index: u64) -> Result<MerkleHash, MerkleTreeError>;
}

impl LeafSource for [MerkleHash] {
    fn leaf_hash(&self, index: u64) -> Result<MerkleHash, MerkleTreeError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.get(i))
            .cloned()
            .ok_or_else(|| MerkleTreeError::corrupted(format!("leaf {} missing", index)))
    }
}

impl LeafSource for Vec<MerkleHash> {
    fn leaf_hash(&self, index: u64) -> Result<MerkleHash, MerkleTreeError> {
        self.as_slice().leaf_hash(index)
    }
}

/// Largest power of two strictly less than `n` (`n >= 2`).
pub fn largest_power_of_two_below(n: u64) -> u64 {
    debug_assert!(n >= 2);
    1 << (63 - (n - 1).leading_zeros())
}

/// Hash of the subtree covering leaves `[left, right)`.
pub fn hash_full<L: LeafSource + ?Sized>(
    hasher: &MerkleHasher,
    leaves: &L,
    left: u64,
    right: u64,
) -> Result<MerkleHash, MerkleTreeError> {
    let width = right.saturating_sub(left);
    match width {
        0 => Ok(hasher.hash_empty()),
        1 => leaves.leaf_hash(left),
        _ => {
            let k = largest_power_of_two_below(width);
            let left_hash = hash_full(hasher, leaves, left, left + k)?;
            let right_hash = hash_full(hasher, leaves, left + k, right)?;
            Ok(hasher.hash_node(&left_hash, &right_hash))
        }
    }
}

/// Audit path for leaf `start + m` within `[start, end)`, leaf to root.
pub fn inclusion_path<L: LeafSource + ?Sized>(
    hasher: &MerkleHasher,
    leaves: &L,
    m: u64,
    start: u64,
    end: u64,
) -> Result<Vec<MerkleHash>, MerkleTreeError> {
    let n = end - start;
    if n <= 1 {
        return Ok(Vec::new());
    }

    let k = largest_power_of_two_below(n);
    if m < k {
        let mut path = inclusion_path(hasher, leaves, m, start, start + k)?;
        path.push(hash_full(hasher, leaves, start + k, end)?);
        Ok(path)
    } else {
        let mut path = inclusion_path(hasher, leaves, m - k, start + k, end)?;
        path.push(hash_full(hasher, leaves, start, start + k)?);
        Ok(path)
    }
}

/// Consistency path proving `[start, start + m)` is a prefix of `[start, end)`.
///
/// `complete` is true while the subtree under consideration is a left edge of
/// the old tree, in which case an exact match is already known to the
/// verifier through the old root and is not emitted.
pub fn consistency_path<L: LeafSource + ?Sized>(
    hasher: &MerkleHasher,
    leaves: &L,
    m: u64,
    start: u64,
    end: u64,
    complete: bool,
) -> Result<Vec<MerkleHash>, MerkleTreeError> {
    let n = end - start;
    if m == n || n == 1 {
        return if complete {
            Ok(Vec::new())
        } else {
            Ok(vec![hash_full(hasher, leaves, start, end)?])
        };
    }

    let k = largest_power_of_two_below(n);
    if m <= k {
        let node = hash_full(hasher, leaves, start + k, end)?;
        let mut path = consistency_path(hasher, leaves, m, start, start + k, complete)?;
        path.push(node);
        Ok(path)
    } else {
        let node = hash_full(hasher, leaves, start, start + k)?;
        let mut path = consistency_path(hasher, leaves, m - k, start + k, end, false)?;
        path.push(node);
        Ok(path)
    }
}
