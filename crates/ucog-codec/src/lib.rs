//! UCOG wire format for ucog.
//!
//! Every payload becomes a sequence of per-chunk tokens behind a small
//! header:
//!
//! ```text
//! "UCOG" || version(u8) || uvarint(n_chunks) || token*
//!
//! 0x00 REF        : uvarint chunk_id
//! 0x01 DELTA      : uvarint ref_id ; uvarint delta_len ; delta bytes
//! 0x02 FULL       : uvarint data_len ; data bytes (plain zstd)
//! 0x03 PRED_DELTA : uvarint k ; k x uvarint dict_chunk_id ;
//!                   uvarint delta_len ; delta bytes
//! ```
//!
//! The encoder picks the smallest viable token per chunk; the decoder
//! reconstructs byte-exact output from the same store. PRED_DELTA embeds
//! the ordered ids that built its dictionary, so decode stays
//! deterministic no matter how co-occurrence data mutates afterwards.

pub mod compact;
pub mod decode;
pub mod encode;
pub mod records;
pub mod streaming;
pub mod varint;

mod compress;

/// ASCII magic at the head of every blob.
pub const MAGIC: [u8; 4] = *b"UCOG";

/// Current wire version. Decoders accept 1 and 2.
pub const VERSION: u8 = 2;

/// Token tags.
pub const TAG_REF: u8 = 0x00;
pub const TAG_DELTA: u8 = 0x01;
pub const TAG_FULL: u8 = 0x02;
pub const TAG_PRED_DELTA: u8 = 0x03;

// Re-exports
pub use compact::{CompactionResult, ContextCompactor};
pub use decode::{decode, DecodeOptions};
pub use encode::{encode, EncodeOptions, EncodeStats};
pub use records::{CompressionOutcome, RecordCompressor};
pub use streaming::StreamEncoder;
