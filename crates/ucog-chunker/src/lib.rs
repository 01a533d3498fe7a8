//! Content-defined chunking for ucog.
//!
//! Splits byte streams at boundaries determined by a 1-bit-shift rolling
//! fingerprint, so that local edits perturb only local chunks. The same
//! boundary rule is exposed two ways:
//!
//! - [`Chunker::split`] for whole-payload batch splitting
//! - [`RollingChunker`] for incremental, byte-at-a-time detection
//!
//! The batch splitter drives a [`RollingChunker`] internally, so the two
//! can never disagree about where a boundary falls.

use ucog_core::{ChunkerParams, Result};

/// Incremental boundary detector over the rolling fingerprint.
///
/// Feed one byte at a time; `update` reports whether a chunk boundary
/// falls immediately after that byte. State resets itself at each
/// boundary, so the detector can run for the lifetime of a stream.
#[derive(Clone, Debug)]
pub struct RollingChunker {
    min_len: usize,
    max_len: usize,
    mask: u64,
    fp: u64,
    len: usize,
}

impl RollingChunker {
    /// Create a detector with validated parameters.
    pub fn new(params: ChunkerParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            min_len: params.min_len,
            max_len: params.max_len,
            mask: params.mask(),
            fp: 0,
            len: 0,
        })
    }

    /// Advance the fingerprint by one byte.
    ///
    /// Returns `true` when a boundary falls immediately after this byte,
    /// in which case the internal state has already reset for the next
    /// chunk.
    pub fn update(&mut self, byte: u8) -> bool {
        self.fp = (self.fp << 1) ^ u64::from(byte);
        self.len += 1;

        if self.len < self.min_len {
            return false;
        }
        if self.len >= self.max_len || self.fp & self.mask == 0 {
            self.fp = 0;
            self.len = 0;
            return true;
        }
        false
    }

    /// Bytes accumulated since the last boundary.
    pub fn pending_len(&self) -> usize {
        self.len
    }

    /// Discard accumulated state.
    pub fn reset(&mut self) {
        self.fp = 0;
        self.len = 0;
    }
}

/// Batch content-defined chunker.
#[derive(Clone, Debug)]
pub struct Chunker {
    params: ChunkerParams,
}

impl Chunker {
    /// Create a chunker with validated parameters.
    pub fn new(params: ChunkerParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// The active parameters.
    pub fn params(&self) -> &ChunkerParams {
        &self.params
    }

    /// Split `data` into content-defined chunks.
    ///
    /// The concatenation of the returned slices is always exactly `data`;
    /// empty input yields no chunks, and input shorter than the minimum
    /// chunk size yields a single chunk.
    pub fn split<'d>(&self, data: &'d [u8]) -> Vec<&'d [u8]> {
        let mut chunks = Vec::with_capacity(data.len() / self.params.avg_len + 1);
        let mut roll = RollingChunker {
            min_len: self.params.min_len,
            max_len: self.params.max_len,
            mask: self.params.mask(),
            fp: 0,
            len: 0,
        };

        let mut start = 0;
        for (i, &byte) in data.iter().enumerate() {
            if roll.update(byte) {
                chunks.push(&data[start..=i]);
                start = i + 1;
            }
        }
        if start < data.len() {
            chunks.push(&data[start..]);
        }
        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            params: ChunkerParams::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let chunker = Chunker::default();
        assert!(chunker.split(b"").is_empty());
    }

    #[test]
    fn test_small_input_single_chunk() {
        let chunker = Chunker::default();
        let chunks = chunker.split(b"small");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], b"small");
    }

    #[test]
    fn test_reassembly() {
        let chunker = Chunker::default();
        let data: Vec<u8> = (0u8..=255).cycle().take(200_000).collect();
        let chunks = chunker.split(&data);
        assert!(chunks.len() > 1);
        let joined: Vec<u8> = chunks.concat();
        assert_eq!(joined, data);
    }

    #[test]
    fn test_chunk_size_bounds() {
        let chunker = Chunker::default();
        let data = vec![0x41u8; 500_000];
        let chunks = chunker.split(&data);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.len() >= 1024, "chunk below minimum: {}", chunk.len());
            assert!(chunk.len() <= 16384, "chunk above maximum: {}", chunk.len());
        }
        assert!(chunks[chunks.len() - 1].len() <= 16384);
    }

    #[test]
    fn test_deterministic() {
        let chunker = Chunker::default();
        let data: Vec<u8> = (0u8..=255).cycle().take(50_000).collect();
        assert_eq!(chunker.split(&data), chunker.split(&data));
    }

    #[test]
    fn test_rolling_matches_batch() {
        let chunker = Chunker::default();
        let data: Vec<u8> = (0u8..=255).cycle().take(60_000).collect();
        let batch = chunker.split(&data);

        let mut roll = RollingChunker::new(ChunkerParams::default()).unwrap();
        let mut incremental = Vec::new();
        let mut start = 0;
        for (i, &byte) in data.iter().enumerate() {
            if roll.update(byte) {
                incremental.push(&data[start..=i]);
                start = i + 1;
            }
        }
        if start < data.len() {
            incremental.push(&data[start..]);
        }
        assert_eq!(batch, incremental);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = ChunkerParams {
            min_len: 100,
            avg_len: 300, // not a power of two
            max_len: 1000,
        };
        assert!(Chunker::new(params).is_err());
        assert!(RollingChunker::new(params).is_err());
    }
}
