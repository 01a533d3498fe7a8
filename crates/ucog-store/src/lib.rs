//! Chunk store backends for ucog.
//!
//! This crate provides the [`CogStore`] abstraction consumed by the codec,
//! plus the backends shipped in-tree:
//!
//! - **MemoryCogStore**: in-memory tiered store (tests, standalone use)
//! - **SqliteCogStore**: durable single-writer store with WAL
//! - **FederatedStore**: composition of a private store and a shared tier

pub mod federated;
pub mod lsh;
pub mod memory;
pub mod sqlite;

mod cold;

use std::collections::BTreeSet;
use ucog_core::{ChunkEntry, Result, Sha256Digest, StoreStats};

pub use federated::{FederatedStore, Federation};
pub use lsh::{extract_bands, LshIndex, BAND_WIDTH, N_BANDS};
pub use memory::{MemoryCogStore, MemoryStoreConfig};
pub use sqlite::SqliteCogStore;

/// Abstract chunk store consumed by the encoder and decoder.
///
/// A store instance is owned by a single logical owner which serialises
/// calls into it; methods therefore take `&mut self` and no interior
/// locking is required of implementations.
pub trait CogStore {
    /// Find a chunk with an exact SHA-256 match.
    ///
    /// A hit increments the chunk's ref count and refreshes its last
    /// access time (intended cache-warming side effect of the read).
    fn lookup_exact(&mut self, sha256: &Sha256Digest) -> Result<Option<ChunkEntry>>;

    /// Find the nearest chunk within the similarity threshold.
    ///
    /// Cold chunks are not candidates; `None` may be returned even when
    /// an archived chunk would have matched.
    fn lookup_similar(&mut self, simhash: u64) -> Result<Option<ChunkEntry>>;

    /// Store a chunk, deduplicating on content.
    ///
    /// Identical bytes return the existing entry with its ref count
    /// incremented; new bytes get a fresh monotonic chunk id.
    fn store(&mut self, data: &[u8]) -> Result<ChunkEntry>;

    /// Retrieve a chunk by id, transparently inflating cold data.
    fn get(&mut self, chunk_id: u64) -> Result<Option<ChunkEntry>>;

    /// Record that these chunks appeared together in one encode.
    fn record_cooccurrence(&mut self, chunk_ids: &[u64]) -> Result<()> {
        let _ = chunk_ids;
        Ok(())
    }

    /// Top-k co-occurring neighbours by descending edge weight, ties
    /// broken by lowest chunk id.
    fn get_predicted_chunks(&mut self, chunk_id: u64, top_k: usize) -> Result<Vec<ChunkEntry>> {
        let _ = (chunk_id, top_k);
        Ok(Vec::new())
    }

    /// Record the chunk ids produced when a payload was encoded.
    fn register_data_chunks(&mut self, data_id: &str, chunk_ids: &BTreeSet<u64>) -> Result<()> {
        let _ = (data_id, chunk_ids);
        Ok(())
    }

    /// All chunk ids recorded for a payload id.
    fn get_chunk_ids_for_data(&mut self, data_id: &str) -> Result<BTreeSet<u64>> {
        let _ = data_id;
        Ok(BTreeSet::new())
    }

    /// Jaccard index over the chunk sets of two payload ids.
    ///
    /// Returns 0.0 both when the sets are disjoint and when both are
    /// empty; the two cases are not distinguished.
    fn structural_similarity(&mut self, data_id_a: &str, data_id_b: &str) -> Result<f64> {
        let a = self.get_chunk_ids_for_data(data_id_a)?;
        let b = self.get_chunk_ids_for_data(data_id_b)?;
        Ok(jaccard(&a, &b))
    }

    /// Sweep warm chunks into the cold archive per the tier policy.
    ///
    /// Returns the number of chunks archived.
    fn archive_cold(&mut self) -> Result<usize> {
        Ok(0)
    }

    /// Store statistics.
    fn stats(&self) -> Result<StoreStats>;

    /// Begin an all-or-nothing batch. Backends without transactions
    /// leave these as no-ops.
    fn begin_batch(&mut self) -> Result<()> {
        Ok(())
    }

    /// Commit the current batch.
    fn commit_batch(&mut self) -> Result<()> {
        Ok(())
    }

    /// Abandon the current batch.
    fn rollback_batch(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Jaccard index over two id sets; 0.0 when both are empty.
pub(crate) fn jaccard(a: &BTreeSet<u64>, b: &BTreeSet<u64>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Wall-clock seconds used for `last_access` stamps.
pub(crate) fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
