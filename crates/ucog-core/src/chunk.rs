//! Chunk entries and storage-tier types.

use crate::hash::Sha256Digest;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Storage tier for a chunk's data blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Pinned in memory for zero-latency exact match.
    Hot,
    /// Durable and similarity-indexed.
    Warm,
    /// Archived in compressed form; excluded from similarity search.
    Cold,
}

impl Tier {
    /// Stable string form used by durable backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Hot => "hot",
            Tier::Warm => "warm",
            Tier::Cold => "cold",
        }
    }

    /// Parse the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hot" => Some(Tier::Hot),
            "warm" => Some(Tier::Warm),
            "cold" => Some(Tier::Cold),
            _ => None,
        }
    }
}

impl Default for Tier {
    fn default() -> Self {
        Self::Warm
    }
}

/// A stored chunk as returned by store lookups.
///
/// Entries always carry their data bytes: cold chunks are inflated from
/// the archive before being handed out.
#[derive(Clone, Debug)]
pub struct ChunkEntry {
    /// Monotonically assigned id, stable for the store's lifetime.
    pub chunk_id: u64,
    /// Exact content identity; unique across the store.
    pub sha256: Sha256Digest,
    /// Locality-sensitive similarity fingerprint.
    pub simhash: u64,
    /// The chunk payload.
    pub data: Bytes,
    /// Incremented on every exact hit and every store of identical bytes.
    pub ref_count: u64,
    /// Wall-clock seconds of the last access.
    pub last_access: i64,
    /// Residency tier at the time of the lookup.
    pub tier: Tier,
}

impl ChunkEntry {
    /// Size of the chunk payload in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Statistics about a chunk store.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of unique chunks (all tiers).
    pub unique_chunks: u64,
    /// Chunks pinned hot.
    pub hot_chunks: u64,
    /// Chunks resident warm.
    pub warm_chunks: u64,
    /// Chunks archived cold.
    pub cold_chunks: u64,
    /// Bytes held uncompressed in hot + warm.
    pub resident_bytes: u64,
    /// Bytes held compressed in the cold archive.
    pub cold_bytes_compressed: u64,
    /// Sum of all ref counts.
    pub total_references: u64,
    /// Entries in the similarity index.
    pub lsh_entries: u64,
    /// Distinct directed co-occurrence edges.
    pub cooccurrence_edges: u64,
}

impl StoreStats {
    /// Average references per unique chunk (1.0 = no dedup).
    pub fn dedup_ratio(&self) -> f64 {
        self.total_references as f64 / self.unique_chunks.max(1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_string_roundtrip() {
        for tier in [Tier::Hot, Tier::Warm, Tier::Cold] {
            assert_eq!(Tier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(Tier::parse("frozen"), None);
    }

    #[test]
    fn test_dedup_ratio() {
        let stats = StoreStats {
            unique_chunks: 80,
            total_references: 100,
            ..Default::default()
        };
        assert_eq!(stats.dedup_ratio(), 1.25);
        assert_eq!(StoreStats::default().dedup_ratio(), 0.0);
    }
}
