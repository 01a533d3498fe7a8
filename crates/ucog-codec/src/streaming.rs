//! Streaming encoder: compress as the data arrives.
//!
//! For live agent sessions, chunks are detected and encoded on the fly
//! instead of in a second pass at session end. Each fed byte advances the
//! rolling fingerprint; on every boundary the finished chunk goes through
//! the same decision procedure as the batch encoder and its token joins
//! an internal log. `finish` flushes the tail and assembles a blob that
//! is byte-identical to what the batch encoder would have produced for
//! the concatenated input.
//!
//! `finish` consumes the encoder, so feeding a finished stream or
//! finishing twice is rejected at compile time.

use crate::encode::{encode_chunk, finish_encode, EncodeOptions, EncodeStats};
use crate::varint::put_uvarint;
use crate::{MAGIC, VERSION};
use ucog_chunker::RollingChunker;
use ucog_core::{Result, SecurityPolicy};
use ucog_predict::PredictiveCompressor;
use ucog_store::CogStore;
use xxhash_rust::xxh64::Xxh64;

/// Incremental UCOG encoder.
pub struct StreamEncoder<'a> {
    store: &'a mut dyn CogStore,
    predictor: Option<&'a mut PredictiveCompressor>,
    level: i32,
    data_id: Option<String>,
    security: SecurityPolicy,
    roll: RollingChunker,
    buf: Vec<u8>,
    tokens: Vec<u8>,
    emitted: Vec<u64>,
    stats: EncodeStats,
    hasher: Xxh64,
    total_fed: u64,
}

impl<'a> StreamEncoder<'a> {
    /// Create a streaming encoder over a store.
    pub fn new(
        store: &'a mut dyn CogStore,
        predictor: Option<&'a mut PredictiveCompressor>,
        opts: &EncodeOptions,
    ) -> Result<Self> {
        Ok(Self {
            store,
            predictor,
            level: opts.zstd_level,
            data_id: opts.data_id.clone(),
            security: opts.security,
            roll: RollingChunker::new(opts.chunker)?,
            buf: Vec::new(),
            tokens: Vec::new(),
            emitted: Vec::new(),
            stats: EncodeStats::default(),
            hasher: Xxh64::new(0),
            total_fed: 0,
        })
    }

    /// Feed bytes into the stream; returns chunks emitted so far.
    pub fn feed(&mut self, data: &[u8]) -> Result<u64> {
        self.hasher.update(data);
        for &byte in data {
            self.buf.push(byte);
            self.total_fed += 1;
            if self.roll.update(byte) {
                let chunk = std::mem::take(&mut self.buf);
                self.emit(&chunk)?;
            }
        }
        Ok(self.emitted.len() as u64)
    }

    /// Feed a text line, appending a newline.
    pub fn feed_line(&mut self, line: &str) -> Result<u64> {
        self.feed(line.as_bytes())?;
        self.feed(b"\n")
    }

    /// Flush any trailing bytes and assemble the blob.
    pub fn finish(mut self) -> Result<(Vec<u8>, EncodeStats)> {
        if !self.buf.is_empty() {
            let chunk = std::mem::take(&mut self.buf);
            self.emit(&chunk)?;
        }

        let mut out = Vec::with_capacity(self.tokens.len() + 16);
        out.extend_from_slice(&MAGIC);
        out.push(VERSION);
        put_uvarint(&mut out, self.emitted.len() as u64);
        out.extend_from_slice(&self.tokens);

        self.stats.chunks = self.emitted.len() as u64;
        self.stats.original_len = self.total_fed;
        self.stats.payload_xxh64 = self.hasher.digest();

        finish_encode(
            self.store,
            self.predictor.as_deref_mut(),
            &self.emitted,
            self.data_id.as_deref(),
        )?;

        Ok((out, self.stats))
    }

    /// Chunks emitted so far.
    pub fn chunks_emitted(&self) -> u64 {
        self.emitted.len() as u64
    }

    /// Bytes fed so far.
    pub fn bytes_fed(&self) -> u64 {
        self.total_fed
    }

    /// Current compression ratio over the emitted tokens; changes as
    /// more data arrives.
    pub fn current_ratio(&self) -> f64 {
        if self.total_fed == 0 {
            return 1.0;
        }
        let compressed = self.tokens.len() + 6; // header overhead
        self.total_fed as f64 / compressed.max(1) as f64
    }

    fn emit(&mut self, chunk: &[u8]) -> Result<()> {
        let trigger = self.emitted.last().copied();
        let (token, chunk_id) = encode_chunk(
            self.store,
            self.predictor.as_deref_mut(),
            trigger,
            chunk,
            self.level,
            &self.security,
            &mut self.stats,
        )?;
        self.tokens.extend_from_slice(&token);
        self.emitted.push(chunk_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{decode, DecodeOptions};
    use crate::encode::encode;
    use ucog_store::MemoryCogStore;

    #[test]
    fn test_streaming_matches_batch() {
        let data: Vec<u8> = b"[TOOL_CALL] search\n[TOOL_RESULT] ok\n".repeat(300);

        let mut batch_store = MemoryCogStore::new();
        let (batch_blob, batch_stats) =
            encode(&data, &mut batch_store, None, &EncodeOptions::default()).unwrap();

        let mut stream_store = MemoryCogStore::new();
        let mut stream =
            StreamEncoder::new(&mut stream_store, None, &EncodeOptions::default()).unwrap();
        for piece in data.chunks(7) {
            stream.feed(piece).unwrap();
        }
        let (stream_blob, stream_stats) = stream.finish().unwrap();

        assert_eq!(stream_blob, batch_blob);
        assert_eq!(stream_stats.chunks, batch_stats.chunks);
        assert_eq!(stream_stats.payload_xxh64, batch_stats.payload_xxh64);

        let decoded = decode(&stream_blob, &mut stream_store, &DecodeOptions::default()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_empty_stream() {
        let mut store = MemoryCogStore::new();
        let stream = StreamEncoder::new(&mut store, None, &EncodeOptions::default()).unwrap();
        let (blob, stats) = stream.finish().unwrap();
        assert_eq!(blob, vec![b'U', b'C', b'O', b'G', 2, 0]);
        assert_eq!(stats.chunks, 0);
    }

    #[test]
    fn test_feed_line() {
        let mut store = MemoryCogStore::new();
        let mut stream = StreamEncoder::new(&mut store, None, &EncodeOptions::default()).unwrap();
        stream.feed_line("[THINKING] Analyzing...").unwrap();
        assert_eq!(stream.bytes_fed(), 24);
        let (blob, stats) = stream.finish().unwrap();
        assert_eq!(stats.chunks, 1);

        let decoded = decode(&blob, &mut store, &DecodeOptions::default()).unwrap();
        assert_eq!(decoded, b"[THINKING] Analyzing...\n");
    }

    #[test]
    fn test_ratio_improves_with_repetition() {
        let mut store = MemoryCogStore::new();
        let pattern: Vec<u8> = b"repetitive agent trace line\n".repeat(400);

        let mut stream = StreamEncoder::new(&mut store, None, &EncodeOptions::default()).unwrap();
        stream.feed(&pattern).unwrap();
        stream.feed(&pattern).unwrap();
        let ratio = stream.current_ratio();
        assert!(ratio > 1.0, "repetitive input should compress, got {ratio}");
        stream.finish().unwrap();
    }
}
