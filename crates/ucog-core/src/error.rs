//! Error types for the ucog engine.

use thiserror::Error;

/// Result type alias using the ucog error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for engine operations.
#[derive(Error, Debug)]
pub enum Error {
    // ==================== Wire Format Errors ====================
    #[error("not a UCOG blob (magic {0:02x?})")]
    InvalidMagic([u8; 4]),

    #[error("unsupported UCOG version {0}")]
    UnsupportedVersion(u8),

    #[error("truncated input while reading {0}")]
    Truncated(&'static str),

    #[error("malformed token tag 0x{0:02x}")]
    MalformedToken(u8),

    #[error("varint exceeds 64 bits")]
    VarintOverflow,

    // ==================== Chunk / Store Errors ====================
    #[error("reference to unknown chunk id {0}")]
    UnknownChunk(u64),

    #[error("predictive dictionary is empty for chunk ids {0:?}")]
    EmptyDictionary(Vec<u64>),

    #[error("unknown motif id {0}")]
    UnknownMotif(u64),

    #[error("store error: {0}")]
    Store(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("cold archive read failed for chunk id {0}")]
    ArchiveRead(u64),

    // ==================== Integrity Errors ====================
    #[error("integrity mismatch: expected {expected:016x}, got {actual:016x}")]
    IntegrityMismatch { expected: u64, actual: u64 },

    #[error("delta expanded {produced} bytes from a {base_len} byte base (limit {limit}x)")]
    ExpansionLimitExceeded {
        base_len: usize,
        produced: usize,
        limit: f64,
    },

    // ==================== Compression Errors ====================
    #[error("compression failed: {0}")]
    Compression(String),

    #[error("decompression failed: {0}")]
    Decompression(String),

    // ==================== Configuration Errors ====================
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ==================== Internal Errors ====================
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns a stable error code for operator diagnosis.
    pub fn code(&self) -> &'static str {
        match self {
            // E1xxx: Wire format
            Error::InvalidMagic(_) => "E1001",
            Error::UnsupportedVersion(_) => "E1002",
            Error::Truncated(_) => "E1003",
            Error::MalformedToken(_) => "E1004",
            Error::VarintOverflow => "E1005",

            // E2xxx: Chunk / store
            Error::UnknownChunk(_) => "E2001",
            Error::EmptyDictionary(_) => "E2002",
            Error::UnknownMotif(_) => "E2003",
            Error::Store(_) => "E2101",
            Error::Database(_) => "E2102",
            Error::ArchiveRead(_) => "E2103",

            // E3xxx: Integrity
            Error::IntegrityMismatch { .. } => "E3001",
            Error::ExpansionLimitExceeded { .. } => "E3002",

            // E4xxx: Compression
            Error::Compression(_) => "E4001",
            Error::Decompression(_) => "E4002",

            // E5xxx: Configuration
            Error::InvalidConfig(_) => "E5001",

            // E9xxx: Internal
            Error::Serialization(_) => "E9001",
            Error::Io(_) => "E9002",
            Error::Internal(_) => "E9003",
        }
    }

    /// Whether the error indicates hostile or corrupt input rather than
    /// an engine defect.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidMagic(_)
                | Error::UnsupportedVersion(_)
                | Error::Truncated(_)
                | Error::MalformedToken(_)
                | Error::VarintOverflow
                | Error::IntegrityMismatch { .. }
                | Error::ExpansionLimitExceeded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::InvalidMagic(*b"BAAD").code(), "E1001");
        assert_eq!(Error::UnknownChunk(7).code(), "E2001");
        assert_eq!(
            Error::IntegrityMismatch { expected: 1, actual: 2 }.code(),
            "E3001"
        );
    }

    #[test]
    fn test_input_errors() {
        assert!(Error::Truncated("token").is_input_error());
        assert!(!Error::Store("down".into()).is_input_error());
    }
}
