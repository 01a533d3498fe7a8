//! Configuration types for the ucog engine.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Main configuration bundle for an engine instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Content-defined chunking parameters.
    pub chunker: ChunkerParams,
    /// Hot/warm/cold residency policy.
    pub tiering: TierPolicy,
    /// Predictive pre-compression settings.
    pub predictor: PredictorConfig,
    /// Compression-ratio anomaly detection settings.
    pub anomaly: AnomalyConfig,
    /// Adversarial-robustness limits.
    pub security: SecurityPolicy,
    /// zstd level for FULL and delta tokens.
    pub zstd_level: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerParams::default(),
            tiering: TierPolicy::default(),
            predictor: PredictorConfig::default(),
            anomaly: AnomalyConfig::default(),
            security: SecurityPolicy::default(),
            zstd_level: 10,
        }
    }
}

/// Parameters for content-defined chunking.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerParams {
    /// Minimum chunk size in bytes.
    pub min_len: usize,
    /// Target average chunk size in bytes; must be a power of two.
    pub avg_len: usize,
    /// Maximum chunk size in bytes.
    pub max_len: usize,
}

impl ChunkerParams {
    /// Boundary mask derived from the average chunk size.
    pub fn mask(&self) -> u64 {
        self.avg_len as u64 - 1
    }

    /// Validate the parameter set.
    pub fn validate(&self) -> Result<()> {
        if self.min_len == 0 {
            return Err(Error::InvalidConfig("min_len must be positive".into()));
        }
        if !self.avg_len.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "avg_len must be a power of two, got {}",
                self.avg_len
            )));
        }
        if self.min_len > self.avg_len || self.avg_len > self.max_len {
            return Err(Error::InvalidConfig(format!(
                "chunk sizes must satisfy min <= avg <= max, got {}/{}/{}",
                self.min_len, self.avg_len, self.max_len
            )));
        }
        Ok(())
    }
}

impl Default for ChunkerParams {
    fn default() -> Self {
        Self {
            min_len: 1024,   // 1 KiB
            avg_len: 4096,   // 4 KiB
            max_len: 16384,  // 16 KiB
        }
    }
}

/// Residency policy for the tiered chunk store.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TierPolicy {
    /// Ref count at which a chunk becomes a hot-pin candidate.
    pub hot_min_ref_count: u64,
    /// Maximum number of hot-pinned chunks.
    pub hot_max_chunks: usize,
    /// Seconds a warm chunk must go untouched before cold archival.
    pub cold_age_secs: i64,
    /// Maximum ref count for a chunk to be a cold-archival candidate.
    pub cold_max_ref_count: u64,
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self {
            hot_min_ref_count: 5,
            hot_max_chunks: 10_000,
            cold_age_secs: 30 * 86_400, // 30 days
            cold_max_ref_count: 1,
        }
    }
}

/// Settings for the co-occurrence predictor.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Capacity of the trigger-id -> dictionary LRU cache.
    pub cache_size: usize,
    /// Number of co-occurring neighbours queried per trigger.
    pub top_k: usize,
    /// Minimum concatenated dictionary length worth building.
    pub min_dict_len: usize,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            cache_size: 256,
            top_k: 5,
            min_dict_len: 64,
        }
    }
}

/// Settings for compression-ratio anomaly detection.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Number of recent ratios kept in the sliding window.
    pub window: usize,
    /// Z-score below which a low-ratio (novelty) alert fires.
    pub z_low: f64,
    /// Z-score above which a high-ratio (duplication) alert fires.
    pub z_high: f64,
    /// Floor applied to the window standard deviation.
    pub min_std: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            window: 50,
            z_low: -2.0,
            z_high: 3.0,
            min_std: 1e-3,
        }
    }
}

/// Limits protecting the engine against adversarial chunks.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    /// Maximum ref count for a chunk to serve as a delta base.
    pub max_ref_count_for_similarity: u64,
    /// Whether to verify hashes after delta decompression when provided.
    pub verify_deltas: bool,
    /// Maximum allowed expansion ratio of a delta over its base.
    pub max_delta_expansion: f64,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            max_ref_count_for_similarity: 1000,
            verify_deltas: true,
            max_delta_expansion: 100.0,
        }
    }
}
