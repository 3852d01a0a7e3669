//! # Tree Hasher
//!
//! RFC 6962 domain-separated hashing.
//!
//! ```text
//! hash_empty()        = H("")
//! hash_leaf(d)        = H(0x00 || d)
//! hash_node(l, r)     = H(0x01 || l || r)
//! ```
//!
//! The one-byte prefix keeps leaf and interior-node preimages disjoint, so an
//! interior node can never be presented as a leaf (second-preimage attack).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;

use super::errors::MerkleTreeError;

/// Prefix for leaf hashing.
pub const LEAF_PREFIX: u8 = 0x00;

/// Prefix for interior node hashing.
pub const NODE_PREFIX: u8 = 0x01;

/// Underlying hash function. Fixed for the life of a log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Digest width in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sha256 => write!(f, "sha256"),
            HashAlgorithm::Sha384 => write!(f, "sha384"),
            HashAlgorithm::Sha512 => write!(f, "sha512"),
        }
    }
}

/// A tree digest (32, 48 or 64 bytes depending on the algorithm).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MerkleHash(Vec<u8>);

impl MerkleHash {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse from hex (either case).
    pub fn from_hex(value: &str) -> Result<Self, MerkleTreeError> {
        hex::decode(value)
            .map(Self)
            .map_err(|e| MerkleTreeError::Encoding {
                message: format!("invalid hex digest: {}", e),
            })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl AsRef<[u8]> for MerkleHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for MerkleHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for MerkleHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MerkleHash({})", self.to_hex())
    }
}

/// Domain-separated tree hasher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MerkleHasher {
    algorithm: HashAlgorithm,
}

impl MerkleHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Root of the empty tree: hash of zero bytes, no prefix.
    pub fn hash_empty(&self) -> MerkleHash {
        self.digest(&[])
    }

    pub fn hash_leaf(&self, data: &[u8]) -> MerkleHash {
        self.digest(&[&[LEAF_PREFIX], data])
    }

    pub fn hash_node(&self, left: &MerkleHash, right: &MerkleHash) -> MerkleHash {
        self.digest(&[&[NODE_PREFIX], left.as_bytes(), right.as_bytes()])
    }

    /// Plain (unprefixed) digest of `data` with this hasher's algorithm.
    pub fn hash_content(&self, data: &[u8]) -> MerkleHash {
        self.digest(&[data])
    }

    fn digest(&self, parts: &[&[u8]]) -> MerkleHash {
        match self.algorithm {
            HashAlgorithm::Sha256 => digest_parts::<Sha256>(parts),
            HashAlgorithm::Sha384 => digest_parts::<Sha384>(parts),
            HashAlgorithm::Sha512 => digest_parts::<Sha512>(parts),
        }
    }
}

fn digest_parts<D: Digest>(parts: &[&[u8]]) -> MerkleHash {
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    MerkleHash(hasher.finalize().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha256() -> MerkleHasher {
        MerkleHasher::new(HashAlgorithm::Sha256)
    }

    fn h(hex_str: &str) -> MerkleHash {
        MerkleHash::from_hex(hex_str).unwrap()
    }

    #[test]
    fn test_hash_empty_known_answer() {
        assert_eq!(
            sha256().hash_empty(),
            h("E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855")
        );
    }

    #[test]
    fn test_hash_leaf_of_empty_input() {
        assert_eq!(
            sha256().hash_leaf(&[]),
            h("6E340B9CFFB37A989CA544E6BB780A2C78901D3FB33738768511A30617AFA01D")
        );
    }

    #[test]
    fn test_hash_leaf_known_answer() {
        let data = hex::decode("101112131415161718191A1B1C1D1E1F").unwrap();
        assert_eq!(
            sha256().hash_leaf(&data),
            h("3BFB960453EBAEBF33727DA7A1F4DB38ACC051D381B6DA20D6D4E88F0EABFD7A")
        );
    }

    #[test]
    fn test_hash_node_known_answer() {
        let left = h("000102030405060708090A0B0C0D0E0F101112131415161718191A1B1C1D1E1F");
        let right = h("202122232425262728292A2B2C2D2E2F303132333435363738393A3B3C3D3E3F");
        assert_eq!(
            sha256().hash_node(&left, &right),
            h("1A378704C17DA31E2D05B6D121C2BB2C7D76F6EE6FA8F983E596C2D034963C57")
        );
    }

    #[test]
    fn test_leaf_and_node_domains_differ() {
        let hasher = sha256();
        let a = hasher.hash_leaf(b"a");
        let b = hasher.hash_leaf(b"b");
        let mut concatenated = a.as_bytes().to_vec();
        concatenated.extend_from_slice(b.as_bytes());

        assert_ne!(hasher.hash_leaf(&concatenated), hasher.hash_node(&a, &b));
    }

    #[test]
    fn test_digest_len_matches_algorithm() {
        for algorithm in [
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
        ] {
            let hasher = MerkleHasher::new(algorithm);
            assert_eq!(hasher.hash_empty().len(), algorithm.digest_len());
            assert_eq!(hasher.hash_leaf(b"x").len(), algorithm.digest_len());
        }
    }

    #[test]
    fn test_display_is_lowercase_hex() {
        let hash = h("ABCDEF");
        assert_eq!(hash.to_string(), "abcdef");
    }
}
