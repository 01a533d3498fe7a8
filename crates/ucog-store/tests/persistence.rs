//! Durability tests for the SQLite backend.

use ucog_core::{simhash64, Sha256Digest, Tier, TierPolicy};
use ucog_store::{CogStore, SqliteCogStore};

#[test]
fn reopen_rebuilds_index_and_serves_lookups() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chunks.db");
    let payload: Vec<u8> = b"persistent log line, seen across sessions\n".repeat(60);

    let chunk_id = {
        let mut store = SqliteCogStore::open(&path, TierPolicy::default()).unwrap();
        let entry = store.store(&payload).unwrap();
        store.store(b"another chunk entirely").unwrap();
        entry.chunk_id
    };

    let mut store = SqliteCogStore::open(&path, TierPolicy::default()).unwrap();

    // Exact lookup across restart, with the ref count carried over.
    let found = store
        .lookup_exact(&Sha256Digest::of(&payload))
        .unwrap()
        .unwrap();
    assert_eq!(found.chunk_id, chunk_id);
    assert_eq!(found.ref_count, 2);

    // The LSH index was rebuilt from rows, so similarity still works.
    let mut near = payload.clone();
    near[3] = b'X';
    let similar = store.lookup_similar(simhash64(&near)).unwrap();
    assert!(similar.is_some(), "rebuilt index should serve similarity lookups");

    assert_eq!(store.stats().unwrap().unique_chunks, 2);
}

#[test]
fn hot_pins_reload_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chunks.db");

    {
        let mut store = SqliteCogStore::open(&path, TierPolicy::default()).unwrap();
        let entry = store.store(b"frequently referenced chunk").unwrap();
        for _ in 0..5 {
            store.lookup_exact(&entry.sha256).unwrap();
        }
    }

    let mut store = SqliteCogStore::open(&path, TierPolicy::default()).unwrap();
    let entry = store
        .lookup_exact(&Sha256Digest::of(b"frequently referenced chunk"))
        .unwrap()
        .unwrap();
    assert_eq!(entry.tier, Tier::Hot);
}

#[test]
fn cold_archive_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chunks.db");
    let policy = TierPolicy {
        cold_age_secs: 0,
        ..TierPolicy::default()
    };
    let payload = b"archived once, read later".repeat(100);

    let chunk_id = {
        let mut store = SqliteCogStore::open(&path, policy).unwrap();
        let entry = store.store(&payload).unwrap();
        assert_eq!(store.archive_cold().unwrap(), 1);
        entry.chunk_id
    };

    let mut store = SqliteCogStore::open(&path, policy).unwrap();
    let stats = store.stats().unwrap();
    assert_eq!(stats.cold_chunks, 1);
    assert_eq!(stats.lsh_entries, 0, "cold chunks stay out of the rebuilt index");

    let entry = store.get(chunk_id).unwrap().unwrap();
    assert_eq!(entry.data.as_ref(), &payload[..]);
    assert_eq!(entry.tier, Tier::Cold);
}
