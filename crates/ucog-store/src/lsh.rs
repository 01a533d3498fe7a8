//! Locality-sensitive hashing index for SimHash similarity lookup.
//!
//! Partitions a 64-bit SimHash into 8 bands of 8 bits. Two hashes sharing
//! any band value are candidate matches; candidates are then verified by
//! exact hamming distance. With these parameters, two hashes within the
//! similarity threshold share at least one band with ~97% probability.

use std::collections::{BTreeSet, HashMap, HashSet};
use ucog_core::hamming_distance;

/// Number of bands a SimHash is partitioned into.
pub const N_BANDS: usize = 8;

/// Bits per band.
pub const BAND_WIDTH: u32 = 8;

/// Extract the band values of a SimHash, low band first.
pub fn extract_bands(simhash: u64) -> [u8; N_BANDS] {
    let mut bands = [0u8; N_BANDS];
    for (i, band) in bands.iter_mut().enumerate() {
        *band = ((simhash >> (i as u32 * BAND_WIDTH)) & 0xFF) as u8;
    }
    bands
}

/// In-memory LSH index over chunk ids.
#[derive(Debug, Default)]
pub struct LshIndex {
    // band_id -> band_value -> chunk ids
    buckets: [HashMap<u8, HashSet<u64>>; N_BANDS],
    // chunk_id -> simhash, for hamming verification
    simhashes: HashMap<u64, u64>,
}

impl LshIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk under each of its band values.
    pub fn insert(&mut self, chunk_id: u64, simhash: u64) {
        self.simhashes.insert(chunk_id, simhash);
        for (band_id, band_value) in extract_bands(simhash).into_iter().enumerate() {
            self.buckets[band_id]
                .entry(band_value)
                .or_default()
                .insert(chunk_id);
        }
    }

    /// Remove a chunk from all bands. Idempotent on unknown ids.
    pub fn remove(&mut self, chunk_id: u64) {
        let Some(simhash) = self.simhashes.remove(&chunk_id) else {
            return;
        };
        for (band_id, band_value) in extract_bands(simhash).into_iter().enumerate() {
            if let Some(bucket) = self.buckets[band_id].get_mut(&band_value) {
                bucket.remove(&chunk_id);
            }
        }
    }

    /// Candidate chunk ids sharing at least one band with the query.
    pub fn query_candidates(&self, simhash: u64) -> BTreeSet<u64> {
        let mut candidates = BTreeSet::new();
        for (band_id, band_value) in extract_bands(simhash).into_iter().enumerate() {
            if let Some(bucket) = self.buckets[band_id].get(&band_value) {
                candidates.extend(bucket.iter().copied());
            }
        }
        candidates
    }

    /// Nearest chunk id within the hamming threshold, ties broken by
    /// lowest chunk id.
    pub fn query_nearest(&self, simhash: u64, threshold: u32) -> Option<u64> {
        let mut best_dist = threshold + 1;
        let mut best_id = None;

        for chunk_id in self.query_candidates(simhash) {
            let stored = self.simhashes[&chunk_id];
            let dist = hamming_distance(simhash, stored);
            if dist < best_dist {
                best_dist = dist;
                best_id = Some(chunk_id);
            }
        }
        best_id
    }

    /// Whether a chunk id is present.
    pub fn contains(&self, chunk_id: u64) -> bool {
        self.simhashes.contains_key(&chunk_id)
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.simhashes.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.simhashes.is_empty()
    }

    /// Atomic clear-and-repopulate, used at startup by durable backends.
    pub fn rebuild(&mut self, entries: impl IntoIterator<Item = (u64, u64)>) {
        self.buckets = Default::default();
        self.simhashes.clear();
        for (chunk_id, simhash) in entries {
            self.insert(chunk_id, simhash);
        }
    }
}
