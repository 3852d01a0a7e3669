//! Record stores: key-value (shared with the log backend) and file system.

use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tl_01_merkle_log::{BatchOperation, KeyValueStore, SignedTreeHead};

use super::duplicates::sanitize;
use crate::domain::entities::StoredRecord;
use crate::domain::errors::StoreError;
use crate::ports::outbound::RecordStore;

// =============================================================================
// KEY-VALUE RECORD STORE
// =============================================================================

/// Records kept in any [`KeyValueStore`].
///
/// ## Key layout
///
/// | Key | Value |
/// |-----|-------|
/// | `{ns}/record/{hex(iss)}/{hex(jti)}` | JSON `StoredRecord` |
/// | `{ns}/keyring/{hex(iss)}/{hex(jti)}` | content hash |
///
/// Both entries go into one batch, so a record is never visible without its
/// keyring entry.
pub struct KvRecordStore<K: KeyValueStore> {
    store: Arc<K>,
    namespace: String,
    write_lock: Mutex<()>,
}

impl<K: KeyValueStore> KvRecordStore<K> {
    pub fn new(store: Arc<K>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn record_key(&self, issuer: &str, id: &str) -> Vec<u8> {
        format!(
            "{}/record/{}/{}",
            self.namespace,
            hex::encode(issuer),
            hex::encode(id)
        )
        .into_bytes()
    }

    fn keyring_prefix(&self, issuer: &str) -> String {
        format!("{}/keyring/{}/", self.namespace, hex::encode(issuer))
    }

    fn keyring_key(&self, issuer: &str, id: &str) -> Vec<u8> {
        format!("{}{}", self.keyring_prefix(issuer), hex::encode(id)).into_bytes()
    }

    /// Token ids recorded for `issuer`, in key order.
    pub fn ids_for_issuer(&self, issuer: &str) -> Result<Vec<String>, StoreError> {
        let prefix = self.keyring_prefix(issuer);
        let entries = self
            .store
            .prefix_scan(prefix.as_bytes())
            .map_err(|e| StoreError::fatal(e.to_string()))?;

        entries
            .into_iter()
            .map(|(key, _)| {
                let encoded = &key[prefix.len()..];
                hex::decode(encoded)
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
                    .ok_or_else(|| StoreError::fatal("corrupted keyring entry"))
            })
            .collect()
    }
}

impl<K: KeyValueStore> RecordStore for KvRecordStore<K> {
    fn store(&self, record: &StoredRecord) -> Result<(), StoreError> {
        let issuer = &record.record.issuer;
        let id = &record.record.id;
        let key = self.record_key(issuer, id);
        let value =
            serde_json::to_vec(record).map_err(|e| StoreError::fatal(e.to_string()))?;

        let _guard = self.write_lock.lock();
        if self
            .store
            .exists(&key)
            .map_err(|e| StoreError::fatal(e.to_string()))?
        {
            return Err(StoreError::DuplicateKey {
                issuer: issuer.clone(),
                id: id.clone(),
            });
        }

        self.store
            .atomic_batch_write(vec![
                BatchOperation::put(key, value),
                BatchOperation::put(
                    self.keyring_key(issuer, id),
                    record.content_hash.as_bytes().to_vec(),
                ),
            ])
            .map_err(|e| StoreError::fatal(e.to_string()))
    }

    fn attach_commitment(
        &self,
        issuer: &str,
        id: &str,
        head: &SignedTreeHead,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let mut stored = self
            .get(issuer, id)?
            .ok_or_else(|| StoreError::fatal(format!("no record {} from {}", id, issuer)))?;
        stored.attach(head);
        let value =
            serde_json::to_vec(&stored).map_err(|e| StoreError::fatal(e.to_string()))?;
        self.store
            .atomic_batch_write(vec![BatchOperation::put(self.record_key(issuer, id), value)])
            .map_err(|e| StoreError::fatal(e.to_string()))
    }

    fn remove(&self, issuer: &str, id: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        self.store
            .atomic_batch_write(vec![
                BatchOperation::delete(self.record_key(issuer, id)),
                BatchOperation::delete(self.keyring_key(issuer, id)),
            ])
            .map_err(|e| StoreError::fatal(e.to_string()))
    }

    fn contains(&self, issuer: &str, id: &str) -> Result<bool, StoreError> {
        self.store
            .exists(&self.record_key(issuer, id))
            .map_err(|e| StoreError::fatal(e.to_string()))
    }

    fn get(&self, issuer: &str, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        match self
            .store
            .get(&self.record_key(issuer, id))
            .map_err(|e| StoreError::fatal(e.to_string()))?
        {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::fatal(format!("corrupted record: {}", e))),
            None => Ok(None),
        }
    }
}

// =============================================================================
// FILE-SYSTEM RECORD STORE
// =============================================================================

/// Records kept as files under `<root>/<issuer>/`.
///
/// `<jti>.jwt` holds the raw token and `<jti>.json` the stored record. Each
/// file is written to a temporary name and renamed into place; the JSON file
/// goes last, so its presence marks a complete record.
pub struct FileSystemRecordStore {
    root: PathBuf,
}

impl FileSystemRecordStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            StoreError::fatal(format!("cannot create {}: {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    fn issuer_dir(&self, issuer: &str) -> PathBuf {
        self.root.join(sanitize(issuer))
    }

    fn record_path(&self, issuer: &str, id: &str) -> PathBuf {
        self.issuer_dir(issuer).join(format!("{}.json", sanitize(id)))
    }

    fn raw_path(&self, issuer: &str, id: &str) -> PathBuf {
        self.issuer_dir(issuer).join(format!("{}.jwt", sanitize(id)))
    }

    fn remove_if_present(path: &Path) -> Result<(), StoreError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::fatal(format!(
                "cannot remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents)
            .and_then(|_| fs::rename(&tmp, path))
            .map_err(|e| {
                let _ = fs::remove_file(&tmp);
                StoreError::fatal(format!("cannot write {}: {}", path.display(), e))
            })
    }
}

impl RecordStore for FileSystemRecordStore {
    fn store(&self, record: &StoredRecord) -> Result<(), StoreError> {
        let issuer = &record.record.issuer;
        let id = &record.record.id;
        let json_path = self.record_path(issuer, id);
        if json_path.exists() {
            return Err(StoreError::DuplicateKey {
                issuer: issuer.clone(),
                id: id.clone(),
            });
        }

        let dir = self.issuer_dir(issuer);
        fs::create_dir_all(&dir).map_err(|e| StoreError::fatal(e.to_string()))?;

        let json =
            serde_json::to_vec_pretty(record).map_err(|e| StoreError::fatal(e.to_string()))?;
        Self::write_atomically(&self.raw_path(issuer, id), &record.record.raw)?;
        Self::write_atomically(&json_path, &json)
    }

    fn attach_commitment(
        &self,
        issuer: &str,
        id: &str,
        head: &SignedTreeHead,
    ) -> Result<(), StoreError> {
        let mut stored = self
            .get(issuer, id)?
            .ok_or_else(|| StoreError::fatal(format!("no record {} from {}", id, issuer)))?;
        stored.attach(head);
        let json =
            serde_json::to_vec_pretty(&stored).map_err(|e| StoreError::fatal(e.to_string()))?;
        Self::write_atomically(&self.record_path(issuer, id), &json)
    }

    fn remove(&self, issuer: &str, id: &str) -> Result<(), StoreError> {
        // JSON first: without it the record is no longer visible.
        Self::remove_if_present(&self.record_path(issuer, id))?;
        Self::remove_if_present(&self.raw_path(issuer, id))
    }

    fn contains(&self, issuer: &str, id: &str) -> Result<bool, StoreError> {
        Ok(self.record_path(issuer, id).exists())
    }

    fn get(&self, issuer: &str, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        match fs::read(self.record_path(issuer, id)) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::fatal(format!("corrupted record: {}", e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::fatal(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::AuditRecord;
    use serde_json::{json, Map};
    use tl_01_merkle_log::{InMemoryKVStore, MerkleHash};

    fn head(tree_size: u64) -> SignedTreeHead {
        SignedTreeHead {
            root_hash: MerkleHash::new(vec![7; 32]),
            tree_size,
            level: 2,
            signature: vec![1, 2, 3],
            bucket: "default".into(),
        }
    }

    fn record(issuer: &str, id: &str) -> StoredRecord {
        let mut events = Map::new();
        events.insert("urn:example:event".into(), json!({"ok": true}));
        StoredRecord::new(
            AuditRecord {
                raw: b"header.payload.sig".to_vec(),
                client_id: "client-1".into(),
                issuer: issuer.into(),
                id: id.into(),
                issued_at: 1_700_000_000,
                audience: vec!["https://hub".into()],
                transaction_id: None,
                time_of_event: Some(1_699_999_999),
                events,
                key_id: Some("k1".into()),
            },
            MerkleHash::new(vec![9; 32]),
            Some(&head(3)),
        )
    }

    // ========== Test Group 1: Key-Value Store ==========

    #[test]
    fn test_kv_store_round_trips_and_rejects_duplicates() {
        let store = KvRecordStore::new(Arc::new(InMemoryKVStore::new()), "hub");
        let stored = record("https://issuer", "a");

        store.store(&stored).unwrap();
        assert!(store.contains("https://issuer", "a").unwrap());
        assert_eq!(store.get("https://issuer", "a").unwrap(), Some(stored.clone()));
        assert_eq!(store.get("https://issuer", "b").unwrap(), None);

        assert_eq!(
            store.store(&stored),
            Err(StoreError::DuplicateKey {
                issuer: "https://issuer".into(),
                id: "a".into()
            })
        );
    }

    #[test]
    fn test_kv_attach_and_remove() {
        let store = KvRecordStore::new(Arc::new(InMemoryKVStore::new()), "hub");
        let mut stored = record("iss", "a");
        stored.root_hash = None;
        stored.tree_size = None;
        store.store(&stored).unwrap();

        store.attach_commitment("iss", "a", &head(5)).unwrap();
        let reread = store.get("iss", "a").unwrap().unwrap();
        assert_eq!(reread.tree_size, Some(5));
        assert_eq!(reread.root_hash, Some(MerkleHash::new(vec![7; 32])));
        assert_eq!(store.ids_for_issuer("iss").unwrap(), vec!["a"]);

        store.remove("iss", "a").unwrap();
        assert!(!store.contains("iss", "a").unwrap());
        assert!(store.ids_for_issuer("iss").unwrap().is_empty());
        store.remove("iss", "a").unwrap();
        assert!(store.attach_commitment("iss", "a", &head(6)).is_err());

        // Removed records can be stored again.
        store.store(&stored).unwrap();
    }

    #[test]
    fn test_kv_keyring_lists_ids_per_issuer() {
        let store = KvRecordStore::new(Arc::new(InMemoryKVStore::new()), "hub");
        store.store(&record("iss-1", "b")).unwrap();
        store.store(&record("iss-1", "a")).unwrap();
        store.store(&record("iss-2", "c")).unwrap();

        assert_eq!(store.ids_for_issuer("iss-1").unwrap(), vec!["a", "b"]);
        assert_eq!(store.ids_for_issuer("iss-2").unwrap(), vec!["c"]);
        assert!(store.ids_for_issuer("iss-3").unwrap().is_empty());
    }

    // ========== Test Group 2: File-System Store ==========

    #[test]
    fn test_fs_store_writes_raw_and_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSystemRecordStore::open(dir.path()).unwrap();
        let stored = record("https://issuer", "id/1");

        store.store(&stored).unwrap();

        let issuer_dir = dir.path().join(sanitize("https://issuer"));
        let raw = fs::read(issuer_dir.join("id%2F1.jwt")).unwrap();
        assert_eq!(raw, b"header.payload.sig");
        assert_eq!(store.get("https://issuer", "id/1").unwrap(), Some(stored.clone()));
        assert!(matches!(
            store.store(&stored),
            Err(StoreError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_fs_attach_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSystemRecordStore::open(dir.path()).unwrap();
        let stored = record("iss", "a");
        store.store(&stored).unwrap();

        store.attach_commitment("iss", "a", &head(9)).unwrap();
        assert_eq!(store.get("iss", "a").unwrap().unwrap().tree_size, Some(9));

        store.remove("iss", "a").unwrap();
        assert!(!store.contains("iss", "a").unwrap());
        assert!(!dir.path().join(sanitize("iss")).join("a.jwt").exists());
        store.remove("iss", "a").unwrap();
        store.store(&stored).unwrap();
    }

    #[test]
    fn test_fs_store_missing_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSystemRecordStore::open(dir.path()).unwrap();

        assert!(!store.contains("iss", "nope").unwrap());
        assert_eq!(store.get("iss", "nope").unwrap(), None);
    }
}
