//! Anticipation and drift analysis for ucog.
//!
//! - **Predictor**: pre-builds compression dictionaries from chunk
//!   co-occurrence so deltas against predicted context become nearly free
//! - **Anomaly detector**: treats sustained compression-ratio changes as
//!   drift and novelty signals
//! - **Temporal motifs**: detects recurring event-order patterns that are
//!   invisible to content-level dedup

pub mod anomaly;
pub mod predictor;
pub mod temporal;

pub use anomaly::{compression_ratio, AnomalyAlert, AnomalyDetector, DriftReport, Severity};
pub use predictor::{PredictedDictionary, PredictiveCompressor};
pub use temporal::{MotifEncoder, MotifEncoding, MotifToken, TemporalMotif, TemporalMotifTracker};
