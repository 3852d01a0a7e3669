//! Audit records: the validated incoming event and its persisted form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tl_01_merkle_log::{MerkleHash, SignedTreeHead};

/// A validated security-event token.
///
/// Created by the validator, consumed exactly once by persistence and log
/// append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Token bytes exactly as submitted.
    #[serde(with = "base64_bytes")]
    pub raw: Vec<u8>,
    /// Authenticated producer.
    pub client_id: String,
    /// `iss`
    pub issuer: String,
    /// `jti`
    pub id: String,
    /// `iat`, seconds since epoch.
    pub issued_at: i64,
    /// `aud`
    pub audience: Vec<String>,
    /// `txn`
    pub transaction_id: Option<String>,
    /// `toe`
    pub time_of_event: Option<i64>,
    /// `events`
    pub events: Map<String, Value>,
    /// `kid` of the signing key, when the token names one.
    pub key_id: Option<String>,
}

impl AuditRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            issuer: self.issuer.clone(),
            id: self.id.clone(),
        }
    }
}

/// Unique identity of a record: issuer plus token id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub issuer: String,
    pub id: String,
}

/// A record as persisted, with its log commitment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub record: AuditRecord,
    /// SHA-256 of the raw token; the leaf data appended to the log.
    pub content_hash: MerkleHash,
    /// Root hash of the tree head returned by the append.
    pub root_hash: Option<MerkleHash>,
    /// Tree size of that head.
    pub tree_size: Option<u64>,
}

impl StoredRecord {
    pub fn new(record: AuditRecord, content_hash: MerkleHash, head: Option<&SignedTreeHead>) -> Self {
        Self {
            record,
            content_hash,
            root_hash: head.map(|h| h.root_hash.clone()),
            tree_size: head.map(|h| h.tree_size),
        }
    }

    pub fn attach(&mut self, head: &SignedTreeHead) {
        self.root_hash = Some(head.root_hash.clone());
        self.tree_size = Some(head.tree_size);
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
