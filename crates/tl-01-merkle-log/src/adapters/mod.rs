//! Adapters: concrete storage backends and the tree head signer.

pub mod kv_storage;
pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocksdb;
pub mod signer;

pub use kv_storage::KvLogStorage;
pub use memory::InMemoryKVStore;
#[cfg(feature = "rocksdb")]
pub use self::rocksdb::{RocksDbConfig, RocksDbStore};
pub use signer::{verify_tree_head_signature, EcdsaTreeSigner};
