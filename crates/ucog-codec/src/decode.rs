//! UCOG blob decoder.
//!
//! Reconstructs the original payload from the same store that served the
//! encode. The decoder never mutates the store: chunk fetches go through
//! `get`, which bumps no counters. Any malformed tag, short read, or
//! failed decompression fails the whole decode with no partial output.

use crate::compress::{decompress_with_dict, zstd_decompress};
use crate::varint::read_uvarint;
use crate::{MAGIC, TAG_DELTA, TAG_FULL, TAG_PRED_DELTA, TAG_REF};
use std::sync::Arc;
use ucog_core::{
    fast_hash, AuditKind, AuditSink, ChunkerParams, Error, IntegrityVerifier, Result,
    SecurityPolicy,
};
use ucog_store::CogStore;

/// Options for a single decode call.
#[derive(Clone)]
pub struct DecodeOptions {
    /// When set, the decoded payload's xxh64 must match or the decode
    /// fails with an integrity error.
    pub expected_xxh64: Option<u64>,
    /// Expansion limits applied to delta tokens.
    pub security: SecurityPolicy,
    /// Upper bound on a single decompressed chunk; also caps hostile
    /// tokens structurally.
    pub max_chunk_len: usize,
    /// Notified on expansion-limit violations.
    pub audit: Option<Arc<dyn AuditSink>>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            expected_xxh64: None,
            security: SecurityPolicy::default(),
            max_chunk_len: ChunkerParams::default().max_len,
            audit: None,
        }
    }
}

/// Decode a UCOG blob back to its original bytes.
pub fn decode(blob: &[u8], store: &mut dyn CogStore, opts: &DecodeOptions) -> Result<Vec<u8>> {
    if blob.len() < 5 {
        return Err(Error::Truncated("header"));
    }
    let mut magic = [0u8; 4];
    magic.copy_from_slice(&blob[..4]);
    if magic != MAGIC {
        return Err(Error::InvalidMagic(magic));
    }
    let version = blob[4];
    if version != 1 && version != 2 {
        return Err(Error::UnsupportedVersion(version));
    }

    let mut offset = 5usize;
    let n_chunks = read_uvarint(blob, &mut offset)?;
    let verifier = IntegrityVerifier::new(opts.security);
    let mut out = Vec::new();

    for _ in 0..n_chunks {
        let tag = *blob.get(offset).ok_or(Error::Truncated("token tag"))?;
        offset += 1;

        match tag {
            TAG_REF => {
                let chunk_id = read_uvarint(blob, &mut offset)?;
                let entry = store
                    .get(chunk_id)?
                    .ok_or(Error::UnknownChunk(chunk_id))?;
                out.extend_from_slice(&entry.data);
            }
            TAG_DELTA => {
                let ref_id = read_uvarint(blob, &mut offset)?;
                let delta = read_bytes(blob, &mut offset)?;
                let base = store.get(ref_id)?.ok_or(Error::UnknownChunk(ref_id))?;
                let restored = decompress_with_dict(delta, &base.data, opts.max_chunk_len)?;
                check_expansion(&verifier, opts, base.data.len(), restored.len())?;
                out.extend_from_slice(&restored);
            }
            TAG_FULL => {
                let payload = read_bytes(blob, &mut offset)?;
                out.extend_from_slice(&zstd_decompress(payload, opts.max_chunk_len)?);
            }
            TAG_PRED_DELTA => {
                let k = read_uvarint(blob, &mut offset)? as usize;
                let mut ids = Vec::with_capacity(k.min(64));
                for _ in 0..k {
                    ids.push(read_uvarint(blob, &mut offset)?);
                }
                let delta = read_bytes(blob, &mut offset)?;

                // Rebuild the dictionary from the exact ids the encoder
                // used, in the order they were written.
                let mut dict = Vec::new();
                for &id in &ids {
                    let entry = store.get(id)?.ok_or(Error::UnknownChunk(id))?;
                    dict.extend_from_slice(&entry.data);
                }
                if dict.is_empty() {
                    return Err(Error::EmptyDictionary(ids));
                }
                let restored = decompress_with_dict(delta, &dict, opts.max_chunk_len)?;
                check_expansion(&verifier, opts, dict.len(), restored.len())?;
                out.extend_from_slice(&restored);
            }
            other => return Err(Error::MalformedToken(other)),
        }
    }

    if let Some(expected) = opts.expected_xxh64 {
        let actual = fast_hash(&out);
        if actual != expected {
            return Err(Error::IntegrityMismatch { expected, actual });
        }
    }
    Ok(out)
}

fn read_bytes<'b>(blob: &'b [u8], offset: &mut usize) -> Result<&'b [u8]> {
    let len = read_uvarint(blob, offset)? as usize;
    let end = offset
        .checked_add(len)
        .ok_or(Error::Truncated("token payload"))?;
    let bytes = blob
        .get(*offset..end)
        .ok_or(Error::Truncated("token payload"))?;
    *offset = end;
    Ok(bytes)
}

fn check_expansion(
    verifier: &IntegrityVerifier,
    opts: &DecodeOptions,
    base_len: usize,
    result_len: usize,
) -> Result<()> {
    if verifier.check_delta_expansion(base_len, result_len) {
        return Ok(());
    }
    let err = Error::ExpansionLimitExceeded {
        base_len,
        produced: result_len,
        limit: opts.security.max_delta_expansion,
    };
    if let Some(sink) = &opts.audit {
        sink.on_event(AuditKind::ExpansionViolation, "decode", &err.to_string());
    }
    Err(err)
}
