//! In-memory cognitive store with LSH-accelerated similarity search.
//!
//! The store owns every chunk in a single dense vector; the sha map, the
//! LSH index, and the hot pin set all hold integer ids into it, so there
//! are no shared-ownership cycles to manage.

use crate::cold::{deflate, inflate};
use crate::lsh::LshIndex;
use crate::{now_secs, CogStore};
use bytes::Bytes;
use std::collections::{BTreeSet, HashMap, HashSet};
use ucog_core::{
    simhash64, ChunkEntry, Error, Result, Sha256Digest, StoreStats, Tier, TierPolicy,
    SIMILARITY_THRESHOLD,
};

/// Configuration for the in-memory backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryStoreConfig {
    /// Hot/warm/cold residency policy.
    pub tiering: TierPolicy,
    /// When set, `store` runs a cold-archive sweep each time the chunk
    /// count exceeds this trigger and is a multiple of 100. This couples
    /// archival cadence to insert order; prefer calling
    /// [`CogStore::archive_cold`] explicitly.
    pub auto_archive_trigger: Option<usize>,
}

struct ChunkRow {
    sha256: Sha256Digest,
    simhash: u64,
    data: Option<Bytes>, // None when the bytes live in the cold archive
    ref_count: u64,
    last_access: i64,
    tier: Tier,
}

struct ColdBlob {
    compressed: Vec<u8>,
}

/// In-memory chunk store.
#[derive(Default)]
pub struct MemoryCogStore {
    config: MemoryStoreConfig,
    rows: Vec<ChunkRow>,
    by_sha: HashMap<Sha256Digest, u64>,
    lsh: LshIndex,
    hot: HashSet<u64>,
    cooccurrence: HashMap<u64, HashMap<u64, u64>>,
    data_chunks: HashMap<String, BTreeSet<u64>>,
    cold: HashMap<u64, ColdBlob>,
}

impl MemoryCogStore {
    /// Create a store with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with explicit configuration.
    pub fn with_config(config: MemoryStoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Number of unique chunks ever stored.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the store has never seen a chunk.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn make_entry(&self, chunk_id: u64) -> Result<ChunkEntry> {
        let row = &self.rows[chunk_id as usize];
        let data = match &row.data {
            Some(data) => data.clone(),
            None => {
                let blob = self
                    .cold
                    .get(&chunk_id)
                    .ok_or(Error::ArchiveRead(chunk_id))?;
                Bytes::from(inflate(&blob.compressed)?)
            }
        };
        Ok(ChunkEntry {
            chunk_id,
            sha256: row.sha256,
            simhash: row.simhash,
            data,
            ref_count: row.ref_count,
            last_access: row.last_access,
            tier: row.tier,
        })
    }

    fn maybe_promote(&mut self, chunk_id: u64) {
        let policy = self.config.tiering;
        {
            let row = &self.rows[chunk_id as usize];
            if row.tier != Tier::Warm || row.ref_count < policy.hot_min_ref_count {
                return;
            }
        }
        if self.hot.len() >= policy.hot_max_chunks {
            let victim = self
                .hot
                .iter()
                .min_by_key(|&&id| self.rows[id as usize].last_access)
                .copied();
            if let Some(victim) = victim {
                self.hot.remove(&victim);
                self.rows[victim as usize].tier = Tier::Warm;
                tracing::debug!(chunk_id = victim, "hot tier full, demoting to warm");
            }
        }
        self.hot.insert(chunk_id);
        self.rows[chunk_id as usize].tier = Tier::Hot;
    }
}

impl CogStore for MemoryCogStore {
    fn lookup_exact(&mut self, sha256: &Sha256Digest) -> Result<Option<ChunkEntry>> {
        let Some(&chunk_id) = self.by_sha.get(sha256) else {
            return Ok(None);
        };
        {
            let row = &mut self.rows[chunk_id as usize];
            row.ref_count += 1;
            row.last_access = now_secs();
        }
        self.maybe_promote(chunk_id);
        self.make_entry(chunk_id).map(Some)
    }

    fn lookup_similar(&mut self, simhash: u64) -> Result<Option<ChunkEntry>> {
        let Some(chunk_id) = self.lsh.query_nearest(simhash, SIMILARITY_THRESHOLD) else {
            return Ok(None);
        };
        self.rows[chunk_id as usize].last_access = now_secs();
        self.make_entry(chunk_id).map(Some)
    }

    fn store(&mut self, data: &[u8]) -> Result<ChunkEntry> {
        let sha = Sha256Digest::of(data);

        if let Some(&chunk_id) = self.by_sha.get(&sha) {
            // Re-warm archived bytes; the chunk does not rejoin the
            // similarity index.
            if let Some(blob) = self.cold.remove(&chunk_id) {
                let raw = inflate(&blob.compressed)?;
                let row = &mut self.rows[chunk_id as usize];
                row.data = Some(Bytes::from(raw));
                row.tier = Tier::Warm;
            }
            let row = &mut self.rows[chunk_id as usize];
            row.ref_count += 1;
            row.last_access = now_secs();
            self.maybe_promote(chunk_id);
            return self.make_entry(chunk_id);
        }

        let chunk_id = self.rows.len() as u64;
        let simhash = simhash64(data);
        self.rows.push(ChunkRow {
            sha256: sha,
            simhash,
            data: Some(Bytes::copy_from_slice(data)),
            ref_count: 1,
            last_access: now_secs(),
            tier: Tier::Warm,
        });
        self.by_sha.insert(sha, chunk_id);
        self.lsh.insert(chunk_id, simhash);

        if let Some(trigger) = self.config.auto_archive_trigger {
            if self.rows.len() > trigger && self.rows.len() % 100 == 0 {
                let archived = self.archive_cold()?;
                tracing::debug!(archived, "auto archive sweep");
            }
        }

        self.make_entry(chunk_id)
    }

    fn get(&mut self, chunk_id: u64) -> Result<Option<ChunkEntry>> {
        if chunk_id as usize >= self.rows.len() {
            return Ok(None);
        }
        self.make_entry(chunk_id).map(Some)
    }

    fn record_cooccurrence(&mut self, chunk_ids: &[u64]) -> Result<()> {
        for &a in chunk_ids {
            for &b in chunk_ids {
                if a == b {
                    continue;
                }
                *self
                    .cooccurrence
                    .entry(a)
                    .or_default()
                    .entry(b)
                    .or_insert(0) += 1;
            }
        }
        Ok(())
    }

    fn get_predicted_chunks(&mut self, chunk_id: u64, top_k: usize) -> Result<Vec<ChunkEntry>> {
        let ids: Vec<u64> = match self.cooccurrence.get(&chunk_id) {
            Some(neighbours) => {
                let mut ranked: Vec<(u64, u64)> =
                    neighbours.iter().map(|(&b, &w)| (b, w)).collect();
                ranked.sort_by(|x, y| y.1.cmp(&x.1).then(x.0.cmp(&y.0)));
                ranked.into_iter().take(top_k).map(|(id, _)| id).collect()
            }
            None => return Ok(Vec::new()),
        };
        ids.into_iter().map(|id| self.make_entry(id)).collect()
    }

    fn register_data_chunks(&mut self, data_id: &str, chunk_ids: &BTreeSet<u64>) -> Result<()> {
        self.data_chunks
            .insert(data_id.to_string(), chunk_ids.clone());
        Ok(())
    }

    fn get_chunk_ids_for_data(&mut self, data_id: &str) -> Result<BTreeSet<u64>> {
        Ok(self.data_chunks.get(data_id).cloned().unwrap_or_default())
    }

    fn archive_cold(&mut self) -> Result<usize> {
        let cutoff = now_secs() - self.config.tiering.cold_age_secs;
        let max_ref = self.config.tiering.cold_max_ref_count;

        let candidates: Vec<u64> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                row.tier == Tier::Warm
                    && row.data.is_some()
                    && row.ref_count <= max_ref
                    && row.last_access <= cutoff
            })
            .map(|(id, _)| id as u64)
            .collect();

        let mut archived = 0;
        for chunk_id in candidates {
            let compressed = match &self.rows[chunk_id as usize].data {
                Some(data) => deflate(data)?,
                None => continue,
            };
            self.cold.insert(chunk_id, ColdBlob { compressed });
            let row = &mut self.rows[chunk_id as usize];
            row.data = None;
            row.tier = Tier::Cold;
            self.lsh.remove(chunk_id);
            archived += 1;
        }
        if archived > 0 {
            tracing::debug!(archived, "archived warm chunks to cold");
        }
        Ok(archived)
    }

    fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats {
            unique_chunks: self.rows.len() as u64,
            lsh_entries: self.lsh.len() as u64,
            cooccurrence_edges: self
                .cooccurrence
                .values()
                .map(|m| m.len() as u64)
                .sum(),
            cold_bytes_compressed: self
                .cold
                .values()
                .map(|b| b.compressed.len() as u64)
                .sum(),
            ..Default::default()
        };
        for row in &self.rows {
            stats.total_references += row.ref_count;
            match row.tier {
                Tier::Hot => stats.hot_chunks += 1,
                Tier::Warm => stats.warm_chunks += 1,
                Tier::Cold => stats.cold_chunks += 1,
            }
            if let Some(data) = &row.data {
                stats.resident_bytes += data.len() as u64;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archiving_store() -> MemoryCogStore {
        MemoryCogStore::with_config(MemoryStoreConfig {
            tiering: TierPolicy {
                cold_age_secs: 0,
                ..TierPolicy::default()
            },
            auto_archive_trigger: None,
        })
    }

    #[test]
    fn test_store_and_exact_lookup() {
        let mut store = MemoryCogStore::new();
        let entry = store.store(b"hello world").unwrap();
        assert_eq!(entry.chunk_id, 0);
        assert_eq!(entry.ref_count, 1);

        let found = store
            .lookup_exact(&Sha256Digest::of(b"hello world"))
            .unwrap()
            .unwrap();
        assert_eq!(found.data.as_ref(), b"hello world");
        assert_eq!(found.ref_count, 2);
    }

    #[test]
    fn test_store_dedup() {
        let mut store = MemoryCogStore::new();
        let e1 = store.store(b"hello").unwrap();
        let e2 = store.store(b"hello").unwrap();
        assert_eq!(e1.chunk_id, e2.chunk_id);
        assert_eq!(e2.ref_count, 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_exact_lookup_miss() {
        let mut store = MemoryCogStore::new();
        store.store(b"hello").unwrap();
        assert!(store
            .lookup_exact(&Sha256Digest::of(b"world"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_get_by_id_and_miss() {
        let mut store = MemoryCogStore::new();
        let entry = store.store(b"test data").unwrap();
        let got = store.get(entry.chunk_id).unwrap().unwrap();
        assert_eq!(got.data.as_ref(), b"test data");
        assert!(store.get(999).unwrap().is_none());
    }

    #[test]
    fn test_similar_lookup_finds_near_duplicate() {
        let mut store = MemoryCogStore::new();
        let original: Vec<u8> =
            b"2025-01-15 INFO server started on port 8080 mode=prod\n".repeat(100);
        store.store(&original).unwrap();

        let mut modified = original.clone();
        modified[10] = b'2';
        let found = store.lookup_similar(simhash64(&modified)).unwrap();
        if let Some(entry) = found {
            assert_eq!(entry.data.as_ref(), &original[..]);
        }
    }

    #[test]
    fn test_predicted_chunks_ranked() {
        let mut store = MemoryCogStore::new();
        let a = store.store(b"chunk a").unwrap().chunk_id;
        let b = store.store(b"chunk b").unwrap().chunk_id;
        let c = store.store(b"chunk c").unwrap().chunk_id;

        store.record_cooccurrence(&[a, b]).unwrap();
        store.record_cooccurrence(&[a, b]).unwrap();
        store.record_cooccurrence(&[a, c]).unwrap();

        let predicted = store.get_predicted_chunks(a, 5).unwrap();
        let ids: Vec<u64> = predicted.iter().map(|e| e.chunk_id).collect();
        assert_eq!(ids, vec![b, c]);
    }

    #[test]
    fn test_predicted_tie_breaks_lowest_id() {
        let mut store = MemoryCogStore::new();
        let a = store.store(b"aaaa").unwrap().chunk_id;
        let b = store.store(b"bbbb").unwrap().chunk_id;
        let c = store.store(b"cccc").unwrap().chunk_id;
        store.record_cooccurrence(&[a, c]).unwrap();
        store.record_cooccurrence(&[a, b]).unwrap();

        let ids: Vec<u64> = store
            .get_predicted_chunks(a, 5)
            .unwrap()
            .iter()
            .map(|e| e.chunk_id)
            .collect();
        assert_eq!(ids, vec![b, c]);
    }

    #[test]
    fn test_structural_similarity() {
        let mut store = MemoryCogStore::new();
        let ids_a: BTreeSet<u64> = [1, 2, 3].into();
        let ids_b: BTreeSet<u64> = [2, 3, 4].into();
        store.register_data_chunks("a", &ids_a).unwrap();
        store.register_data_chunks("b", &ids_b).unwrap();

        assert_eq!(store.structural_similarity("a", "a").unwrap(), 1.0);
        assert_eq!(store.structural_similarity("a", "b").unwrap(), 0.5);
        assert_eq!(store.structural_similarity("x", "y").unwrap(), 0.0);
    }

    #[test]
    fn test_archive_cold_roundtrip() {
        let mut store = archiving_store();
        let data = b"single use payload, never referenced again".repeat(50);
        let entry = store.store(&data).unwrap();

        let archived = store.archive_cold().unwrap();
        assert_eq!(archived, 1);
        assert!(!store.lsh.contains(entry.chunk_id));

        // Data still addressable through the archive.
        let got = store.get(entry.chunk_id).unwrap().unwrap();
        assert_eq!(got.data.as_ref(), &data[..]);
        assert_eq!(got.tier, Tier::Cold);

        // Similarity search no longer surfaces it.
        assert!(store.lookup_similar(entry.simhash).unwrap().is_none());
    }

    #[test]
    fn test_store_rewarms_cold_chunk() {
        let mut store = archiving_store();
        let data = b"payload that goes cold and comes back".repeat(40);
        let entry = store.store(&data).unwrap();
        store.archive_cold().unwrap();

        let back = store.store(&data).unwrap();
        assert_eq!(back.chunk_id, entry.chunk_id);
        assert_eq!(back.tier, Tier::Warm);
        assert_eq!(back.ref_count, 2);
    }

    #[test]
    fn test_hot_promotion() {
        let mut store = MemoryCogStore::new();
        let entry = store.store(b"frequently used chunk").unwrap();
        for _ in 0..4 {
            store.lookup_exact(&entry.sha256).unwrap();
        }
        let got = store.get(entry.chunk_id).unwrap().unwrap();
        assert_eq!(got.tier, Tier::Hot);
        assert_eq!(got.ref_count, 5);
    }

    #[test]
    fn test_ref_counts_monotonic() {
        let mut store = MemoryCogStore::new();
        let mut last = 0;
        for _ in 0..5 {
            let entry = store.store(b"same bytes").unwrap();
            assert!(entry.ref_count > last);
            last = entry.ref_count;
        }
    }

    #[test]
    fn test_stats() {
        let mut store = MemoryCogStore::new();
        store.store(b"one").unwrap();
        store.store(b"two").unwrap();
        store.store(b"one").unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.unique_chunks, 2);
        assert_eq!(stats.total_references, 3);
        assert_eq!(stats.warm_chunks, 2);
        assert_eq!(stats.lsh_entries, 2);
    }
}
