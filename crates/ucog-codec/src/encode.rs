//! The four-way chunk encoder.
//!
//! Per chunk, the encoder computes every viable token and emits the
//! smallest one. An exact store hit short-circuits everything: a REF is
//! always the smallest possible encoding.

use crate::compress::{compress_with_dict, zstd_compress};
use crate::varint::put_uvarint;
use crate::{MAGIC, TAG_DELTA, TAG_FULL, TAG_PRED_DELTA, TAG_REF, VERSION};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use ucog_chunker::Chunker;
use ucog_core::{fast_hash, simhash64, ChunkerParams, Result, SecurityPolicy, Sha256Digest};
use ucog_predict::PredictiveCompressor;
use ucog_store::CogStore;

/// Options for a single encode call.
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    /// zstd level for FULL and delta tokens.
    pub zstd_level: i32,
    /// Caller-supplied payload id; when set, the produced chunk ids are
    /// registered against it for structural similarity queries.
    pub data_id: Option<String>,
    /// Chunking parameters; must match across encode and any streaming
    /// encoders sharing the store.
    pub chunker: ChunkerParams,
    /// Limits on delta bases.
    pub security: SecurityPolicy,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            zstd_level: 10,
            data_id: None,
            chunker: ChunkerParams::default(),
            security: SecurityPolicy::default(),
        }
    }
}

/// Counters describing one encoded blob.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct EncodeStats {
    /// Chunks in the payload.
    pub chunks: u64,
    /// Chunks emitted as REF tokens.
    pub refs: u64,
    /// Chunks emitted as DELTA tokens.
    pub deltas: u64,
    /// Chunks emitted as FULL tokens.
    pub fulls: u64,
    /// Chunks emitted as PRED_DELTA tokens.
    pub pred_deltas: u64,
    /// Payload size in bytes.
    pub original_len: u64,
    /// xxh64 of the payload, for out-of-band integrity checks.
    pub payload_xxh64: u64,
}

impl EncodeStats {
    /// Sum of the per-token counters; always equals `chunks`.
    pub fn tokens(&self) -> u64 {
        self.refs + self.deltas + self.fulls + self.pred_deltas
    }
}

/// Encode a payload against a store, optionally with a predictor.
///
/// Returns the UCOG blob and the per-token stats. New chunks are stored
/// as a side effect; on backends with transactions the whole encode is
/// all-or-nothing.
pub fn encode(
    data: &[u8],
    store: &mut dyn CogStore,
    mut predictor: Option<&mut PredictiveCompressor>,
    opts: &EncodeOptions,
) -> Result<(Vec<u8>, EncodeStats)> {
    let chunker = Chunker::new(opts.chunker)?;
    let chunks = chunker.split(data);

    store.begin_batch()?;
    match encode_inner(data, &chunks, store, predictor.as_deref_mut(), opts) {
        Ok(out) => {
            store.commit_batch()?;
            Ok(out)
        }
        Err(err) => {
            if let Err(rollback_err) = store.rollback_batch() {
                tracing::warn!(%rollback_err, "rollback after failed encode also failed");
            }
            Err(err)
        }
    }
}

fn encode_inner(
    data: &[u8],
    chunks: &[&[u8]],
    store: &mut dyn CogStore,
    mut predictor: Option<&mut PredictiveCompressor>,
    opts: &EncodeOptions,
) -> Result<(Vec<u8>, EncodeStats)> {
    let mut out = Vec::with_capacity(data.len() / 4 + 16);
    out.extend_from_slice(&MAGIC);
    out.push(VERSION);
    put_uvarint(&mut out, chunks.len() as u64);

    let mut stats = EncodeStats {
        chunks: chunks.len() as u64,
        original_len: data.len() as u64,
        payload_xxh64: fast_hash(data),
        ..Default::default()
    };

    let mut emitted: Vec<u64> = Vec::with_capacity(chunks.len());
    for &chunk in chunks {
        let trigger = emitted.last().copied();
        let (token, chunk_id) = encode_chunk(
            store,
            predictor.as_deref_mut(),
            trigger,
            chunk,
            opts.zstd_level,
            &opts.security,
            &mut stats,
        )?;
        out.extend_from_slice(&token);
        emitted.push(chunk_id);
    }

    finish_encode(store, predictor, &emitted, opts.data_id.as_deref())?;
    Ok((out, stats))
}

/// Post-encode bookkeeping shared by the batch and streaming paths.
pub(crate) fn finish_encode(
    store: &mut dyn CogStore,
    predictor: Option<&mut PredictiveCompressor>,
    emitted: &[u64],
    data_id: Option<&str>,
) -> Result<()> {
    if let Some(predictor) = predictor {
        if emitted.len() >= 2 {
            predictor.update_after_encode(store, emitted)?;
        }
    }
    if let Some(data_id) = data_id {
        if !data_id.is_empty() {
            let ids: BTreeSet<u64> = emitted.iter().copied().collect();
            store.register_data_chunks(data_id, &ids)?;
        }
    }
    Ok(())
}

/// Encode one chunk, returning the winning token and the emitted id.
pub(crate) fn encode_chunk(
    store: &mut dyn CogStore,
    predictor: Option<&mut PredictiveCompressor>,
    trigger: Option<u64>,
    chunk: &[u8],
    level: i32,
    security: &SecurityPolicy,
    stats: &mut EncodeStats,
) -> Result<(Vec<u8>, u64)> {
    let sha256 = Sha256Digest::of(chunk);

    // Exact match: a REF is always the smallest possible encoding.
    if let Some(exact) = store.lookup_exact(&sha256)? {
        let mut token = vec![TAG_REF];
        put_uvarint(&mut token, exact.chunk_id);
        stats.refs += 1;
        return Ok((token, exact.chunk_id));
    }

    let simhash = simhash64(chunk);

    // FULL is always viable and seeds the comparison.
    let full_payload = zstd_compress(chunk, level)?;
    let mut best = Vec::with_capacity(full_payload.len() + 8);
    best.push(TAG_FULL);
    put_uvarint(&mut best, full_payload.len() as u64);
    best.extend_from_slice(&full_payload);
    let mut best_tag = TAG_FULL;

    // DELTA against the nearest similar chunk, unless its ref count
    // makes it suspect as a universal base.
    if let Some(similar) = store.lookup_similar(simhash)? {
        if similar.ref_count <= security.max_ref_count_for_similarity {
            let delta = compress_with_dict(chunk, &similar.data, level)?;
            let mut token = Vec::with_capacity(delta.len() + 12);
            token.push(TAG_DELTA);
            put_uvarint(&mut token, similar.chunk_id);
            put_uvarint(&mut token, delta.len() as u64);
            token.extend_from_slice(&delta);
            if token.len() < best.len() {
                best = token;
                best_tag = TAG_DELTA;
            }
        } else {
            tracing::debug!(
                chunk_id = similar.chunk_id,
                ref_count = similar.ref_count,
                "skipping delta base over ref-count ceiling"
            );
        }
    }

    // PRED_DELTA against the dictionary predicted by the previous chunk.
    if let (Some(predictor), Some(trigger)) = (predictor, trigger) {
        if let Some(built) = predictor.get_dictionary_and_ids(store, trigger)? {
            match compress_with_dict(chunk, &built.dict, level) {
                Ok(delta) => {
                    let mut token = Vec::with_capacity(delta.len() + 16);
                    token.push(TAG_PRED_DELTA);
                    put_uvarint(&mut token, built.ids.len() as u64);
                    for &id in &built.ids {
                        put_uvarint(&mut token, id);
                    }
                    put_uvarint(&mut token, delta.len() as u64);
                    token.extend_from_slice(&delta);
                    if token.len() < best.len() {
                        best = token;
                        best_tag = TAG_PRED_DELTA;
                    }
                }
                Err(err) => {
                    // Local recovery: the chunk still has FULL (and
                    // possibly DELTA) to fall back on.
                    tracing::debug!(%err, trigger, "predictive compression failed");
                }
            }
        }
    }

    match best_tag {
        TAG_DELTA => stats.deltas += 1,
        TAG_PRED_DELTA => stats.pred_deltas += 1,
        _ => stats.fulls += 1,
    }

    let entry = store.store(chunk)?;
    Ok((best, entry.chunk_id))
}
