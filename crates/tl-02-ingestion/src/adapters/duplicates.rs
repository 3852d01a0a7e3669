//! Duplicate stores: reserve `(issuer, id)` before a record is enqueued.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::domain::entities::RecordKey;
use crate::domain::errors::StoreError;
use crate::ports::outbound::{DuplicateStore, SystemTimeSource, TimeSource};

/// Default reservation lifetime: one day.
pub const DEFAULT_DUPLICATE_TTL_SECS: i64 = 24 * 60 * 60;

/// In-memory duplicate store with a reservation lifetime.
///
/// Entries older than the TTL (measured from reservation time) are treated
/// as absent and removed lazily or by [`purge_expired`](Self::purge_expired).
pub struct InMemoryDuplicateStore {
    entries: DashMap<RecordKey, i64>,
    ttl_secs: i64,
    time: Arc<dyn TimeSource>,
}

impl Default for InMemoryDuplicateStore {
    fn default() -> Self {
        Self::new(DEFAULT_DUPLICATE_TTL_SECS, Arc::new(SystemTimeSource))
    }
}

impl InMemoryDuplicateStore {
    pub fn new(ttl_secs: i64, time: Arc<dyn TimeSource>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_secs,
            time,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired reservations. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.time.now();
        let before = self.entries.len();
        self.entries
            .retain(|_, reserved_at| now - *reserved_at < self.ttl_secs);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Purged expired duplicate reservations");
        }
        removed
    }

    fn key(issuer: &str, id: &str) -> RecordKey {
        RecordKey {
            issuer: issuer.to_string(),
            id: id.to_string(),
        }
    }
}

impl DuplicateStore for InMemoryDuplicateStore {
    fn try_add(&self, issuer: &str, id: &str, _issued_at: i64) -> Result<bool, StoreError> {
        let now = self.time.now();
        match self.entries.entry(Self::key(issuer, id)) {
            Entry::Occupied(mut occupied) => {
                if now - *occupied.get() >= self.ttl_secs {
                    occupied.insert(now);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                Ok(true)
            }
        }
    }

    fn release(&self, issuer: &str, id: &str) -> Result<(), StoreError> {
        self.entries.remove(&Self::key(issuer, id));
        Ok(())
    }
}

/// Duplicate store backed by marker files, one per `(issuer, id)`.
///
/// Reservation is `create_new`, so concurrent submitters across processes
/// sharing the directory race safely.
pub struct FileSystemDuplicateStore {
    root: PathBuf,
}

impl FileSystemDuplicateStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            StoreError::fatal(format!("cannot create {}: {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    fn marker_path(&self, issuer: &str, id: &str) -> PathBuf {
        self.root.join(sanitize(issuer)).join(sanitize(id))
    }
}

impl DuplicateStore for FileSystemDuplicateStore {
    fn try_add(&self, issuer: &str, id: &str, issued_at: i64) -> Result<bool, StoreError> {
        let path = self.marker_path(issuer, id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::fatal(e.to_string()))?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(issued_at.to_string().as_bytes())
                    .map_err(|e| StoreError::fatal(e.to_string()))?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(StoreError::fatal(format!(
                "cannot reserve {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn release(&self, issuer: &str, id: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.marker_path(issuer, id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::fatal(e.to_string())),
        }
    }
}

/// Map an arbitrary identifier onto a single safe path component.
///
/// ASCII alphanumerics plus `-` and `_` pass through; every other byte is
/// `%XX`-escaped, so the mapping is injective and never yields `.` or `..`.
pub(crate) fn sanitize(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    if out.is_empty() {
        out.push('%');
    }
    out
}
