//! [`LogStorage`] over any ordered [`KeyValueStore`].
//!
//! ## Key Layout
//!
//! ```text
//! {ns}/node/{hash}          -> bincode(MerkleNode)
//! {ns}/leaf/{index:be64}    -> leaf hash
//! {ns}/leaf-idx/{hash}      -> index:be64
//! {ns}/head/{size:be64}     -> bincode(SignedTreeHead)
//! {ns}/latest               -> size:be64
//! ```
//!
//! Big-endian indices make a prefix scan over `leaf/` return leaves in append
//! order.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::domain::entities::{MerkleNode, SignedTreeHead};
use crate::domain::errors::MerkleTreeError;
use crate::domain::hasher::MerkleHash;
use crate::ports::outbound::{BatchOperation, KeyValueStore, LogStorage, UnitOfWork};

pub struct KvLogStorage<K: KeyValueStore> {
    store: Arc<K>,
    namespace: String,
}

impl<K: KeyValueStore> KvLogStorage<K> {
    pub fn new(store: Arc<K>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn store(&self) -> &Arc<K> {
        &self.store
    }

    fn key(&self, kind: &str, suffix: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.namespace.len() + kind.len() + suffix.len() + 2);
        key.extend_from_slice(self.namespace.as_bytes());
        key.push(b'/');
        key.extend_from_slice(kind.as_bytes());
        key.push(b'/');
        key.extend_from_slice(suffix);
        key
    }

    fn node_key(&self, hash: &MerkleHash) -> Vec<u8> {
        self.key("node", hash.as_bytes())
    }

    fn leaf_key(&self, index: u64) -> Vec<u8> {
        self.key("leaf", &index.to_be_bytes())
    }

    fn leaf_index_key(&self, hash: &MerkleHash) -> Vec<u8> {
        self.key("leaf-idx", hash.as_bytes())
    }

    fn head_key(&self, tree_size: u64) -> Vec<u8> {
        self.key("head", &tree_size.to_be_bytes())
    }

    fn latest_key(&self) -> Vec<u8> {
        let mut key = self.namespace.as_bytes().to_vec();
        key.extend_from_slice(b"/latest");
        key
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, MerkleTreeError> {
    bincode::serialize(value).map_err(|e| MerkleTreeError::Encoding {
        message: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, MerkleTreeError> {
    bincode::deserialize(bytes).map_err(|e| MerkleTreeError::Encoding {
        message: e.to_string(),
    })
}

fn decode_u64(bytes: &[u8]) -> Result<u64, MerkleTreeError> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| MerkleTreeError::corrupted(format!("expected 8-byte index, got {}", bytes.len())))?;
    Ok(u64::from_be_bytes(array))
}

impl<K: KeyValueStore> LogStorage for KvLogStorage<K> {
    fn node(&self, hash: &MerkleHash) -> Result<Option<MerkleNode>, MerkleTreeError> {
        self.store
            .get(&self.node_key(hash))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn leaf(&self, index: u64) -> Result<Option<MerkleHash>, MerkleTreeError> {
        Ok(self.store.get(&self.leaf_key(index))?.map(MerkleHash::new))
    }

    fn leaf_index(&self, hash: &MerkleHash) -> Result<Option<u64>, MerkleTreeError> {
        self.store
            .get(&self.leaf_index_key(hash))?
            .map(|bytes| decode_u64(&bytes))
            .transpose()
    }

    fn leaves(&self) -> Result<Vec<MerkleHash>, MerkleTreeError> {
        let prefix = self.key("leaf", &[]);
        Ok(self
            .store
            .prefix_scan(&prefix)?
            .into_iter()
            .map(|(_, value)| MerkleHash::new(value))
            .collect())
    }

    fn head(&self, tree_size: u64) -> Result<Option<SignedTreeHead>, MerkleTreeError> {
        self.store
            .get(&self.head_key(tree_size))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn latest_head(&self) -> Result<Option<SignedTreeHead>, MerkleTreeError> {
        match self.store.get(&self.latest_key())? {
            Some(bytes) => {
                let tree_size = decode_u64(&bytes)?;
                let head = self.head(tree_size)?.ok_or_else(|| {
                    MerkleTreeError::corrupted(format!(
                        "latest pointer references missing head {}",
                        tree_size
                    ))
                })?;
                Ok(Some(head))
            }
            None => Ok(None),
        }
    }

    fn commit(&self, work: UnitOfWork) -> Result<(), MerkleTreeError> {
        if work.is_empty() {
            return Ok(());
        }

        let mut operations = Vec::with_capacity(
            work.nodes.len() + work.leaves.len() * 2 + work.heads.len() + 1,
        );

        for node in &work.nodes {
            operations.push(BatchOperation::put(self.node_key(&node.hash), encode(node)?));
        }

        for (index, hash) in &work.leaves {
            operations.push(BatchOperation::put(
                self.leaf_key(*index),
                hash.as_bytes().to_vec(),
            ));
            operations.push(BatchOperation::put(
                self.leaf_index_key(hash),
                index.to_be_bytes().to_vec(),
            ));
        }

        let mut newest = None;
        for head in &work.heads {
            operations.push(BatchOperation::put(self.head_key(head.tree_size), encode(head)?));
            newest = newest.max(Some(head.tree_size));
        }
        if let Some(tree_size) = newest {
            operations.push(BatchOperation::put(
                self.latest_key(),
                tree_size.to_be_bytes().to_vec(),
            ));
        }

        self.store.atomic_batch_write(operations)?;
        Ok(())
    }
}
