//! Hash types and similarity fingerprints for content addressing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Size of a SHA-256 digest in bytes.
pub const DIGEST_SIZE: usize = 32;

/// FNV-1a 64-bit offset basis.
const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a 64-bit prime.
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Maximum hamming distance at which two SimHashes count as similar.
pub const SIMILARITY_THRESHOLD: u32 = 8;

/// A content-addressable SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Sha256Digest([u8; DIGEST_SIZE]);

impl Sha256Digest {
    /// Compute the digest of a byte slice.
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Create a digest from raw bytes.
    pub fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a digest from a slice.
    ///
    /// # Panics
    /// Panics if slice length != DIGEST_SIZE
    pub fn from_slice(slice: &[u8]) -> Self {
        let mut bytes = [0u8; DIGEST_SIZE];
        bytes.copy_from_slice(slice);
        Self(bytes)
    }

    /// Create a digest from a hex string.
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex)?;
        if bytes.len() != DIGEST_SIZE {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        Ok(Self::from_slice(&bytes))
    }

    /// Get the raw bytes of the digest.
    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get a short representation (first 8 chars).
    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256Digest({})", self.short())
    }
}

impl AsRef<[u8]> for Sha256Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; DIGEST_SIZE]> for Sha256Digest {
    fn from(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }
}

/// 64-bit SimHash over sliding 4-byte shingles.
///
/// Each shingle is hashed with FNV-1a; every hash votes +1/−1 on each of
/// the 64 bit positions and the output bit is set where the vote is
/// positive. Inputs shorter than one shingle hash to 0.
pub fn simhash64(data: &[u8]) -> u64 {
    if data.len() < 4 {
        return 0;
    }

    let mut counts = [0i64; 64];
    for shingle in data.windows(4) {
        let mut h = FNV_OFFSET;
        for &b in shingle {
            h ^= u64::from(b);
            h = h.wrapping_mul(FNV_PRIME);
        }
        for (bit, count) in counts.iter_mut().enumerate() {
            if h & (1u64 << bit) != 0 {
                *count += 1;
            } else {
                *count -= 1;
            }
        }
    }

    let mut result = 0u64;
    for (bit, &count) in counts.iter().enumerate() {
        if count > 0 {
            result |= 1u64 << bit;
        }
    }
    result
}

/// Hamming distance between two 64-bit fingerprints.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}
