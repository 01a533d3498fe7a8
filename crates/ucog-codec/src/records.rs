//! Batch re-encoding of structured records through the codec.
//!
//! Session records, evidence entries, and audit events are themselves
//! highly repetitive; running them through the same store creates a
//! virtuous cycle where every archived batch makes the next one cheaper.
//! Records are framed as JSONL; free-text notes use a `---` divider.

use crate::decode::{decode, DecodeOptions};
use crate::encode::{encode, EncodeOptions, EncodeStats};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ucog_core::{AuditKind, AuditSink, Error, Result};
use ucog_store::CogStore;

const NOTE_DIVIDER: &str = "\n---\n";

/// Result of one batch compression.
#[derive(Clone, Debug)]
pub struct CompressionOutcome {
    pub blob: Vec<u8>,
    pub original_size: usize,
    pub compressed_size: usize,
    pub ratio: f64,
    pub savings_pct: f64,
    pub items: usize,
    pub stats: EncodeStats,
}

/// Running totals across batches.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct RecordCompressorStats {
    pub batches: u64,
    pub total_original_bytes: u64,
    pub total_compressed_bytes: u64,
    pub overall_ratio: f64,
}

/// Compresses batches of structured records against a shared store.
pub struct RecordCompressor {
    data_id_prefix: String,
    zstd_level: i32,
    total_original: u64,
    total_compressed: u64,
    batches: u64,
    audit: Option<Arc<dyn AuditSink>>,
}

impl RecordCompressor {
    /// Create a compressor; `data_id_prefix` namespaces batch ids.
    pub fn new(data_id_prefix: impl Into<String>) -> Self {
        Self {
            data_id_prefix: data_id_prefix.into(),
            zstd_level: 10,
            total_original: 0,
            total_compressed: 0,
            batches: 0,
            audit: None,
        }
    }

    /// Attach an audit sink notified on every successful batch.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Compress a batch of JSON records (JSONL framing).
    pub fn compress_records(
        &mut self,
        store: &mut dyn CogStore,
        records: &[serde_json::Value],
        batch_id: &str,
    ) -> Result<CompressionOutcome> {
        let mut lines = Vec::with_capacity(records.len());
        for record in records {
            lines.push(
                serde_json::to_string(record)
                    .map_err(|err| Error::Serialization(err.to_string()))?,
            );
        }
        let raw = lines.join("\n").into_bytes();
        self.encode_batch(store, &raw, batch_id, records.len())
    }

    /// Decompress a batch back into JSON records.
    pub fn decompress_records(
        &self,
        store: &mut dyn CogStore,
        blob: &[u8],
    ) -> Result<Vec<serde_json::Value>> {
        let raw = decode(blob, store, &DecodeOptions::default())?;
        let text =
            String::from_utf8(raw).map_err(|err| Error::Serialization(err.to_string()))?;
        let mut records = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            records.push(
                serde_json::from_str(line).map_err(|err| Error::Serialization(err.to_string()))?,
            );
        }
        Ok(records)
    }

    /// Compress free-text entries joined by a `---` divider.
    pub fn compress_notes(
        &mut self,
        store: &mut dyn CogStore,
        notes: &[String],
        batch_id: &str,
    ) -> Result<CompressionOutcome> {
        let raw = notes.join(NOTE_DIVIDER).into_bytes();
        self.encode_batch(store, &raw, batch_id, notes.len())
    }

    /// Decompress a notes batch.
    pub fn decompress_notes(&self, store: &mut dyn CogStore, blob: &[u8]) -> Result<Vec<String>> {
        let raw = decode(blob, store, &DecodeOptions::default())?;
        let text =
            String::from_utf8(raw).map_err(|err| Error::Serialization(err.to_string()))?;
        Ok(text.split(NOTE_DIVIDER).map(str::to_string).collect())
    }

    /// Running totals.
    pub fn stats(&self) -> RecordCompressorStats {
        RecordCompressorStats {
            batches: self.batches,
            total_original_bytes: self.total_original,
            total_compressed_bytes: self.total_compressed,
            overall_ratio: self.total_original as f64 / self.total_compressed.max(1) as f64,
        }
    }

    fn encode_batch(
        &mut self,
        store: &mut dyn CogStore,
        raw: &[u8],
        batch_id: &str,
        items: usize,
    ) -> Result<CompressionOutcome> {
        let data_id = if batch_id.is_empty() {
            None
        } else {
            Some(format!("{}:{}", self.data_id_prefix, batch_id))
        };
        let opts = EncodeOptions {
            zstd_level: self.zstd_level,
            data_id: data_id.clone(),
            ..EncodeOptions::default()
        };
        let (blob, stats) = encode(raw, store, None, &opts)?;

        let original_size = raw.len();
        let compressed_size = blob.len();
        let ratio = original_size as f64 / compressed_size.max(1) as f64;
        let savings_pct =
            (original_size.saturating_sub(compressed_size)) as f64 * 100.0
                / original_size.max(1) as f64;

        self.total_original += original_size as u64;
        self.total_compressed += compressed_size as u64;
        self.batches += 1;

        if let Some(sink) = &self.audit {
            sink.on_event(
                AuditKind::BatchEncode,
                data_id.as_deref().unwrap_or("adhoc"),
                &format!("items={items} ratio={ratio:.2} chunks={}", stats.chunks),
            );
        }

        Ok(CompressionOutcome {
            blob,
            original_size,
            compressed_size,
            ratio,
            savings_pct,
            items,
            stats,
        })
    }
}
