//! # ECDSA Tree Head Signer (secp256k1)
//!
//! Signs the root digest directly as an ECDSA prehash, so the signature
//! commits to exactly the bytes published in the tree head.
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - 64-byte `r || s` detached signatures
//! - 33-byte compressed SEC1 verifying keys

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};

use crate::domain::errors::SignerError;
use crate::domain::hasher::MerkleHash;
use crate::ports::outbound::MerkleSigner;

const SUPPORTED_DIGEST_LENGTHS: [usize; 3] = [32, 48, 64];

pub struct EcdsaTreeSigner {
    signing_key: SigningKey,
}

impl EcdsaTreeSigner {
    /// Generate a random signing key.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, SignerError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| SignerError::InvalidKey)?;
        Ok(Self { signing_key })
    }

    /// Create from a 64-character hex secret key.
    pub fn from_hex(secret: &str) -> Result<Self, SignerError> {
        let bytes: [u8; 32] = hex::decode(secret.trim())
            .map_err(|_| SignerError::InvalidKey)?
            .try_into()
            .map_err(|_| SignerError::InvalidKey)?;
        Self::from_bytes(bytes)
    }

    /// Compressed SEC1 verifying key.
    pub fn public_key(&self) -> Vec<u8> {
        self.signing_key.verifying_key().to_sec1_bytes().to_vec()
    }

    /// Verify a tree head signature with this signer's key.
    pub fn verify(&self, digest: &MerkleHash, signature: &[u8]) -> bool {
        verify_tree_head_signature(&self.public_key(), digest, signature)
    }
}

impl MerkleSigner for EcdsaTreeSigner {
    fn sign(&self, digest: &MerkleHash) -> Result<Vec<u8>, SignerError> {
        if !SUPPORTED_DIGEST_LENGTHS.contains(&digest.len()) {
            return Err(SignerError::UnsupportedDigest(digest.len()));
        }
        let signature: Signature = self
            .signing_key
            .sign_prehash(digest.as_bytes())
            .map_err(|e| SignerError::SigningFailed(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }
}

/// Check a detached tree head signature against a SEC1 verifying key.
pub fn verify_tree_head_signature(public_key: &[u8], digest: &MerkleHash, signature: &[u8]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    verifying_key
        .verify_prehash(digest.as_bytes(), &signature)
        .is_ok()
}
