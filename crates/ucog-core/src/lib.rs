//! # ucog-core
//!
//! Core types, traits, and abstractions for the ucog cognitive
//! deduplication engine.
//!
//! This crate provides the foundational building blocks used across all
//! ucog components:
//!
//! - **Hashes**: SHA-256 content identity, 64-bit SimHash similarity
//! - **Types**: chunk entries, storage tiers, store statistics
//! - **Config**: engine configuration with serde-friendly defaults
//! - **Errors**: unified error type for the entire engine
//! - **Integrity**: fast verification hash and security policy
//! - **Audit**: best-effort event hook exposed to the surrounding system

pub mod audit;
pub mod chunk;
pub mod config;
pub mod error;
pub mod hash;
pub mod integrity;

// Re-exports
pub use audit::{AuditKind, AuditSink, TracingAuditSink};
pub use chunk::{ChunkEntry, StoreStats, Tier};
pub use config::{
    AnomalyConfig, ChunkerParams, EngineConfig, PredictorConfig, SecurityPolicy, TierPolicy,
};
pub use error::{Error, Result};
pub use hash::{hamming_distance, simhash64, Sha256Digest, SIMILARITY_THRESHOLD};
pub use integrity::{fast_hash, IntegrityVerifier};
