//! Self-compressing context windows.
//!
//! Chunks the store has seen many times are boilerplate the model does
//! not need to read again. The compactor replaces such chunks in a
//! prompt with a compact `«REF:id»` placeholder and expands placeholders
//! back to the original bytes afterwards.
//!
//! Only chunks that are standalone-valid UTF-8 are substituted, which
//! keeps the compacted prompt valid UTF-8 and makes expansion an exact
//! inverse for any valid prompt.

use std::collections::HashMap;
use ucog_core::{ChunkerParams, Error, Result, Sha256Digest};
use ucog_chunker::Chunker;
use ucog_store::CogStore;

const REF_OPEN: &str = "«REF:";
const REF_CLOSE: char = '»';

/// Result of compacting one prompt.
#[derive(Clone, Debug)]
pub struct CompactionResult {
    /// The compacted prompt.
    pub text: String,
    /// Rough token estimate of the input (~4 chars per token).
    pub original_tokens: usize,
    /// Rough token estimate of the output.
    pub compressed_tokens: usize,
    /// Percentage of estimated tokens saved.
    pub savings_pct: f64,
    /// Placeholders inserted.
    pub refs_inserted: usize,
    /// Chunks the prompt split into.
    pub chunks_total: usize,
}

fn estimate_tokens(len: usize) -> usize {
    (len / 4).max(1)
}

/// Replaces high-frequency chunks in prompts with compact references.
pub struct ContextCompactor {
    min_ref_count: u64,
    min_chunk_len: usize,
    chunker: Chunker,
    expansion_cache: HashMap<u64, Vec<u8>>,
    total_saved_tokens: u64,
    total_compactions: u64,
}

impl ContextCompactor {
    /// Create a compactor; chunks shorter than `min_chunk_len` bytes or
    /// referenced fewer than `min_ref_count` times are never replaced.
    pub fn new(min_ref_count: u64, min_chunk_len: usize) -> Result<Self> {
        Ok(Self {
            min_ref_count,
            min_chunk_len,
            chunker: Chunker::new(ChunkerParams::default())?,
            expansion_cache: HashMap::new(),
            total_saved_tokens: 0,
            total_compactions: 0,
        })
    }

    /// Compact a prompt against the store's chunk frequencies.
    pub fn compress_prompt(
        &mut self,
        store: &mut dyn CogStore,
        prompt: &str,
    ) -> Result<CompactionResult> {
        let data = prompt.as_bytes();
        let chunks = self.chunker.split(data);
        let original_tokens = estimate_tokens(prompt.len());

        if chunks.is_empty() {
            return Ok(CompactionResult {
                text: prompt.to_string(),
                original_tokens,
                compressed_tokens: original_tokens,
                savings_pct: 0.0,
                refs_inserted: 0,
                chunks_total: 0,
            });
        }

        let mut out: Vec<u8> = Vec::with_capacity(data.len());
        let mut refs_inserted = 0;

        for chunk in &chunks {
            let replaceable =
                chunk.len() >= self.min_chunk_len && std::str::from_utf8(chunk).is_ok();
            let hit = if replaceable {
                store.lookup_exact(&Sha256Digest::of(chunk))?
            } else {
                None
            };

            match hit {
                Some(entry) if entry.ref_count >= self.min_ref_count => {
                    out.extend_from_slice(format!("{REF_OPEN}{}{REF_CLOSE}", entry.chunk_id).as_bytes());
                    self.expansion_cache.insert(entry.chunk_id, chunk.to_vec());
                    refs_inserted += 1;
                }
                _ => out.extend_from_slice(chunk),
            }
        }

        let text = String::from_utf8(out)
            .map_err(|err| Error::Internal(format!("compacted prompt not utf-8: {err}")))?;
        let compressed_tokens = estimate_tokens(text.len());
        let savings_pct = original_tokens.saturating_sub(compressed_tokens) as f64 * 100.0
            / original_tokens.max(1) as f64;

        self.total_saved_tokens += original_tokens.saturating_sub(compressed_tokens) as u64;
        self.total_compactions += 1;

        Ok(CompactionResult {
            text,
            original_tokens,
            compressed_tokens,
            savings_pct,
            refs_inserted,
            chunks_total: chunks.len(),
        })
    }

    /// Expand `«REF:id»` placeholders back to their original content.
    ///
    /// Unknown references are left in place.
    pub fn expand_text(&self, store: &mut dyn CogStore, text: &str) -> Result<String> {
        let mut out: Vec<u8> = Vec::with_capacity(text.len());
        let mut rest = text;

        while let Some(open) = rest.find(REF_OPEN) {
            out.extend_from_slice(&rest.as_bytes()[..open]);
            let after = &rest[open + REF_OPEN.len()..];

            let parsed = after.find(REF_CLOSE).and_then(|close| {
                after[..close]
                    .parse::<u64>()
                    .ok()
                    .filter(|_| close > 0)
                    .map(|id| (id, close))
            });

            match parsed {
                Some((chunk_id, close)) => {
                    if let Some(cached) = self.expansion_cache.get(&chunk_id) {
                        out.extend_from_slice(cached);
                    } else if let Some(entry) = store.get(chunk_id)? {
                        out.extend_from_slice(&entry.data);
                    } else {
                        // Cannot expand; keep the placeholder verbatim.
                        out.extend_from_slice(
                            format!("{REF_OPEN}{chunk_id}{REF_CLOSE}").as_bytes(),
                        );
                    }
                    rest = &after[close + REF_CLOSE.len_utf8()..];
                }
                None => {
                    out.extend_from_slice(REF_OPEN.as_bytes());
                    rest = after;
                }
            }
        }
        out.extend_from_slice(rest.as_bytes());

        String::from_utf8(out)
            .map_err(|err| Error::Internal(format!("expanded prompt not utf-8: {err}")))
    }

    /// Estimated tokens saved across all compactions.
    pub fn total_saved_tokens(&self) -> u64 {
        self.total_saved_tokens
    }

    /// Prompts compacted so far.
    pub fn total_compactions(&self) -> u64 {
        self.total_compactions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucog_store::MemoryCogStore;

    fn warm_store(store: &mut MemoryCogStore, prompt: &str, times: usize) {
        let chunker = Chunker::default();
        for _ in 0..times {
            for chunk in chunker.split(prompt.as_bytes()) {
                store.store(chunk).unwrap();
            }
        }
    }

    #[test]
    fn test_compact_and_expand_roundtrip() {
        let mut store = MemoryCogStore::new();
        let boilerplate = "You are a helpful assistant. Follow the tool protocol exactly. "
            .repeat(100);
        warm_store(&mut store, &boilerplate, 3);

        let mut compactor = ContextCompactor::new(3, 100).unwrap();
        let result = compactor.compress_prompt(&mut store, &boilerplate).unwrap();
        assert!(result.refs_inserted > 0);
        assert!(result.text.len() < boilerplate.len());
        assert!(result.savings_pct > 0.0);

        let expanded = compactor.expand_text(&mut store, &result.text).unwrap();
        assert_eq!(expanded, boilerplate);
    }

    #[test]
    fn test_unseen_prompt_untouched() {
        let mut store = MemoryCogStore::new();
        let mut compactor = ContextCompactor::new(3, 100).unwrap();
        let prompt = "A short, novel prompt the store has never seen.";
        let result = compactor.compress_prompt(&mut store, prompt).unwrap();
        assert_eq!(result.text, prompt);
        assert_eq!(result.refs_inserted, 0);
    }

    #[test]
    fn test_expand_unknown_ref_left_in_place() {
        let mut store = MemoryCogStore::new();
        let compactor = ContextCompactor::new(3, 100).unwrap();
        let text = "prefix «REF:9999» suffix";
        assert_eq!(
            compactor.expand_text(&mut store, text).unwrap(),
            text
        );
    }

    #[test]
    fn test_expand_ignores_malformed_placeholder() {
        let mut store = MemoryCogStore::new();
        let compactor = ContextCompactor::new(3, 100).unwrap();
        let text = "prefix «REF:notanumber» suffix";
        let expanded = compactor.expand_text(&mut store, text).unwrap();
        assert!(expanded.contains("«REF:"));
    }

    #[test]
    fn test_empty_prompt() {
        let mut store = MemoryCogStore::new();
        let mut compactor = ContextCompactor::new(3, 100).unwrap();
        let result = compactor.compress_prompt(&mut store, "").unwrap();
        assert_eq!(result.text, "");
        assert_eq!(result.chunks_total, 0);
    }
}
