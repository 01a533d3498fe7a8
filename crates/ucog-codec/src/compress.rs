//! Thin wrappers over the zstd bulk APIs.
//!
//! Dictionaries are raw chunk bytes supplied verbatim; decompression is
//! always capacity-bounded so a hostile token cannot expand without
//! limit.

use ucog_core::{Error, Result};

pub(crate) fn zstd_compress(data: &[u8], level: i32) -> Result<Vec<u8>> {
    zstd::bulk::compress(data, level).map_err(|err| Error::Compression(err.to_string()))
}

pub(crate) fn zstd_decompress(data: &[u8], capacity: usize) -> Result<Vec<u8>> {
    zstd::bulk::decompress(data, capacity).map_err(|err| Error::Decompression(err.to_string()))
}

pub(crate) fn compress_with_dict(data: &[u8], dict: &[u8], level: i32) -> Result<Vec<u8>> {
    let mut compressor = zstd::bulk::Compressor::with_dictionary(level, dict)
        .map_err(|err| Error::Compression(err.to_string()))?;
    compressor
        .compress(data)
        .map_err(|err| Error::Compression(err.to_string()))
}

pub(crate) fn decompress_with_dict(data: &[u8], dict: &[u8], capacity: usize) -> Result<Vec<u8>> {
    let mut decompressor = zstd::bulk::Decompressor::with_dictionary(dict)
        .map_err(|err| Error::Decompression(err.to_string()))?;
    decompressor
        .decompress(data, capacity)
        .map_err(|err| Error::Decompression(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_roundtrip() {
        let data = b"plain zstd roundtrip".repeat(50);
        let compressed = zstd_compress(&data, 10).unwrap();
        assert_eq!(zstd_decompress(&compressed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_dictionary_roundtrip() {
        let dict = b"shared context shared context shared context".repeat(10);
        let data = b"shared context with a small difference".repeat(10);
        let delta = compress_with_dict(&data, &dict, 10).unwrap();
        let plain = zstd_compress(&data, 10).unwrap();
        assert!(delta.len() <= plain.len());
        assert_eq!(
            decompress_with_dict(&delta, &dict, data.len()).unwrap(),
            data
        );
    }

    #[test]
    fn test_capacity_bound_enforced() {
        let data = vec![0u8; 10_000];
        let compressed = zstd_compress(&data, 10).unwrap();
        assert!(zstd_decompress(&compressed, 100).is_err());
    }
}
