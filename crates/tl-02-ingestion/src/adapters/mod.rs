//! Adapters: token validator, duplicate stores and record stores.

pub mod duplicates;
pub mod jws;
pub mod records;

pub use duplicates::{FileSystemDuplicateStore, InMemoryDuplicateStore, DEFAULT_DUPLICATE_TTL_SECS};
pub use jws::{encode_compact_jws, CompactJwsValidator};
pub use records::{FileSystemRecordStore, KvRecordStore};
