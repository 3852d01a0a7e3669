//! # Tree Verifier
//!
//! Stateless verification of inclusion and consistency proofs against a
//! trusted tree head. Never touches storage.
//!
//! Both walks share one rule per level, with `node` the running index and
//! `last` the index of the rightmost node at that level:
//!
//! | Condition         | Proof element is | Combine            |
//! |-------------------|------------------|--------------------|
//! | `node` odd        | left sibling     | `H(proof, acc)`    |
//! | `node < last`     | right sibling    | `H(acc, proof)`    |
//! | otherwise         | (none consumed)  | unpaired, move up  |

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::entities::SignedTreeHead;
use super::errors::MerkleTreeError;
use super::hasher::{MerkleHash, MerkleHasher};

/// Outcome of a proof verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationResult {
    Success,
    ProofTooShort,
    ProofTooLong,
    /// Two heads of the same size commit to different roots (fork or equivocation).
    DifferentHashSameSize,
    HashMismatch {
        expected: MerkleHash,
        computed: MerkleHash,
    },
}

impl VerificationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationResult::Success)
    }
}

/// Pure proof verifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeVerifier {
    hasher: MerkleHasher,
}

impl TreeVerifier {
    pub fn new(hasher: MerkleHasher) -> Self {
        Self { hasher }
    }

    /// Verify that `leaf_hash` sits at `leaf_index` under `trusted_head`.
    pub fn verify_inclusion(
        &self,
        leaf_hash: &MerkleHash,
        leaf_index: u64,
        proof: &[MerkleHash],
        trusted_head: &SignedTreeHead,
    ) -> Result<VerificationResult, MerkleTreeError> {
        if leaf_index >= trusted_head.tree_size {
            return Err(MerkleTreeError::OutOfRange {
                name: "leaf index",
                value: leaf_index,
                limit: trusted_head.tree_size,
            });
        }

        let mut node = leaf_index;
        let mut last = trusted_head.tree_size - 1;
        let mut computed = leaf_hash.clone();
        let mut path = proof.iter();

        while last > 0 {
            if node & 1 == 1 {
                let Some(sibling) = path.next() else {
                    return Ok(VerificationResult::ProofTooShort);
                };
                computed = self.hasher.hash_node(sibling, &computed);
            } else if node < last {
                let Some(sibling) = path.next() else {
                    return Ok(VerificationResult::ProofTooShort);
                };
                computed = self.hasher.hash_node(&computed, sibling);
            }
            node >>= 1;
            last >>= 1;
        }

        if path.next().is_some() {
            return Ok(VerificationResult::ProofTooLong);
        }

        if computed != trusted_head.root_hash {
            return Ok(VerificationResult::HashMismatch {
                expected: trusted_head.root_hash.clone(),
                computed,
            });
        }

        Ok(VerificationResult::Success)
    }

    /// Verify that the tree of `old_size` (root `old_root`) is a prefix of
    /// the tree of `new_size` (root `new_root`).
    pub fn verify_consistency(
        &self,
        old_size: u64,
        new_size: u64,
        old_root: &MerkleHash,
        new_root: &MerkleHash,
        proof: &[MerkleHash],
    ) -> Result<VerificationResult, MerkleTreeError> {
        if old_size > new_size {
            return Err(MerkleTreeError::InvalidRange {
                first: old_size,
                second: new_size,
            });
        }

        if old_size == new_size {
            if old_root != new_root {
                return Ok(VerificationResult::DifferentHashSameSize);
            }
            if !proof.is_empty() {
                warn!(
                    tree_size = old_size,
                    proof_len = proof.len(),
                    "Ignoring non-empty consistency proof for identical tree sizes"
                );
            }
            return Ok(VerificationResult::Success);
        }

        if old_size == 0 {
            return Ok(if proof.is_empty() {
                VerificationResult::Success
            } else {
                VerificationResult::ProofTooLong
            });
        }

        let mut node = old_size - 1;
        let mut last = new_size - 1;
        while node & 1 == 1 {
            node >>= 1;
            last >>= 1;
        }

        let mut path = proof.iter();

        // A non-zero boundary node means the old root is not itself a node of
        // the new tree; the first proof element stands in for it.
        let (mut old_hash, mut new_hash) = if node != 0 {
            match path.next() {
                Some(seed) => (seed.clone(), seed.clone()),
                None => return Ok(VerificationResult::ProofTooShort),
            }
        } else {
            (old_root.clone(), old_root.clone())
        };

        while node != 0 {
            if node & 1 == 1 {
                let Some(sibling) = path.next() else {
                    return Ok(VerificationResult::ProofTooShort);
                };
                old_hash = self.hasher.hash_node(sibling, &old_hash);
                new_hash = self.hasher.hash_node(sibling, &new_hash);
            } else if node < last {
                let Some(sibling) = path.next() else {
                    return Ok(VerificationResult::ProofTooShort);
                };
                new_hash = self.hasher.hash_node(&new_hash, sibling);
            }
            node >>= 1;
            last >>= 1;
        }

        while last != 0 {
            let Some(sibling) = path.next() else {
                return Ok(VerificationResult::ProofTooShort);
            };
            new_hash = self.hasher.hash_node(&new_hash, sibling);
            last >>= 1;
        }

        if &new_hash != new_root {
            return Ok(VerificationResult::HashMismatch {
                expected: new_root.clone(),
                computed: new_hash,
            });
        }

        if &old_hash != old_root {
            return Ok(VerificationResult::HashMismatch {
                expected: old_root.clone(),
                computed: old_hash,
            });
        }

        if path.next().is_some() {
            return Ok(VerificationResult::ProofTooLong);
        }

        Ok(VerificationResult::Success)
    }
}
