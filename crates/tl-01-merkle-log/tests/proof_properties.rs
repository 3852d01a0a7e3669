//! Property tests: every proof the log generates verifies against the head it
//! was generated for, at arbitrary tree sizes.

use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

use tl_01_merkle_log::domain::proofs::hash_full;
use tl_01_merkle_log::{
    EcdsaTreeSigner, InMemoryKVStore, KvLogStorage, LogConfig, MerkleHash, MerkleLogApi,
    MerkleLogService, TreeVerifier, VerificationResult,
};

// =============================================================================
// TEST HELPERS
// =============================================================================

type MemoryLog = MerkleLogService<KvLogStorage<InMemoryKVStore>>;

fn log_with(count: u64) -> MemoryLog {
    let storage = Arc::new(KvLogStorage::new(Arc::new(InMemoryKVStore::new()), "prop"));
    let log = MerkleLogService::new(
        storage,
        Arc::new(EcdsaTreeSigner::generate()),
        LogConfig::default(),
    );
    for i in 0..count {
        log.append(&i.to_be_bytes()).unwrap();
    }
    log
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn inclusion_proofs_verify(size in 1u64..96, seed in any::<u64>()) {
        let log = log_with(size);
        let verifier = TreeVerifier::new(*log.hasher());
        let index = seed % size;

        let head = log.tree_head(size).unwrap().unwrap();
        let proof = log.inclusion_proof(index, size).unwrap();
        let leaf = log.hasher().hash_leaf(&index.to_be_bytes());

        prop_assert_eq!(
            verifier.verify_inclusion(&leaf, index, &proof, &head).unwrap(),
            VerificationResult::Success
        );
    }

    #[test]
    fn consistency_proofs_verify(size in 1u64..96, seed in any::<u64>()) {
        let log = log_with(size);
        let verifier = TreeVerifier::new(*log.hasher());
        let old_size = seed % (size + 1);

        let old_root = log.root_hash(old_size).unwrap();
        let new_root = log.root_hash(size).unwrap();
        let proof = log.consistency_proof(old_size, size).unwrap();

        prop_assert_eq!(
            verifier.verify_consistency(old_size, size, &old_root, &new_root, &proof).unwrap(),
            VerificationResult::Success
        );
    }

    #[test]
    fn historical_roots_never_change(size in 1u64..64, extra in 1u64..32) {
        let log = log_with(size);
        let before = log.root_hash(size).unwrap();

        for i in size..size + extra {
            log.append(&i.to_be_bytes()).unwrap();
        }

        prop_assert_eq!(log.root_hash(size).unwrap(), before.clone());
        prop_assert_eq!(log.tree_head(size).unwrap().unwrap().root_hash, before);
    }

    #[test]
    fn running_root_equals_hash_full(leaves in prop::collection::vec(any::<[u8; 8]>(), 1..48)) {
        let storage = Arc::new(KvLogStorage::new(Arc::new(InMemoryKVStore::new()), "prop"));
        let log = MerkleLogService::new(storage, Arc::new(EcdsaTreeSigner::generate()), LogConfig::default());
        let mut hashes: Vec<MerkleHash> = Vec::new();

        for data in &leaves {
            let leaf = log.hasher().hash_leaf(data);
            let head = log.append(data).unwrap();
            if !hashes.contains(&leaf) {
                hashes.push(leaf);
            }
            let expected = hash_full(log.hasher(), &hashes, 0, hashes.len() as u64).unwrap();
            prop_assert_eq!(head.tree_size, hashes.len() as u64);
            prop_assert_eq!(head.root_hash, expected);
        }
    }
}

// =============================================================================
// CONCURRENCY
// =============================================================================

#[test]
fn test_proofs_for_committed_sizes_verify_during_appends() {
    let log = Arc::new(log_with(8));
    let verifier = TreeVerifier::new(*log.hasher());

    let writer = {
        let log = Arc::clone(&log);
        thread::spawn(move || {
            for i in 8u64..200 {
                log.append(&i.to_be_bytes()).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for _ in 0..50 {
                    let head = log.latest_head().unwrap().unwrap();
                    let size = head.tree_size;
                    let index = size / 2;
                    let proof = log.inclusion_proof(index, size).unwrap();
                    let leaf = log.hasher().hash_leaf(&index.to_be_bytes());
                    assert!(verifier
                        .verify_inclusion(&leaf, index, &proof, &head)
                        .unwrap()
                        .is_success());
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(log.tree_size().unwrap(), 200);
    assert!(log.verify_integrity().unwrap());
}
