//! Integrity verification for decompressed chunks.
//!
//! A fast non-cryptographic hash guards delta chains against bit flips,
//! and the [`SecurityPolicy`] limits keep adversarial chunks from becoming
//! universal delta bases or decompression bombs.

use crate::config::SecurityPolicy;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::xxh64;

/// Fast 64-bit hash for integrity verification.
pub fn fast_hash(data: &[u8]) -> u64 {
    xxh64(data, 0)
}

/// Verify integrity of decompressed chunks against a security policy.
///
/// Tracks verification counts for monitoring.
#[derive(Debug, Default)]
pub struct IntegrityVerifier {
    policy: SecurityPolicy,
    verified: u64,
    failed: u64,
}

/// Verification counters.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct IntegrityStats {
    pub verified: u64,
    pub failed: u64,
    pub failure_rate: f64,
}

impl IntegrityVerifier {
    /// Create a verifier with the given policy.
    pub fn new(policy: SecurityPolicy) -> Self {
        Self {
            policy,
            verified: 0,
            failed: 0,
        }
    }

    /// Verify data against an expected hash.
    pub fn verify(&mut self, data: &[u8], expected: u64) -> bool {
        if fast_hash(data) == expected {
            self.verified += 1;
            true
        } else {
            self.failed += 1;
            false
        }
    }

    /// Check that a delta's output stays within safe expansion bounds
    /// relative to its dictionary base.
    pub fn check_delta_expansion(&self, base_len: usize, result_len: usize) -> bool {
        if base_len == 0 {
            // No base to scale against; cap at an absolute 1 MiB.
            return result_len < 1024 * 1024;
        }
        (result_len as f64 / base_len as f64) <= self.policy.max_delta_expansion
    }

    /// Check that a chunk's ref count permits use as a delta base.
    pub fn check_ref_count(&self, ref_count: u64) -> bool {
        ref_count <= self.policy.max_ref_count_for_similarity
    }

    /// The active policy.
    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// Verification counters.
    pub fn stats(&self) -> IntegrityStats {
        IntegrityStats {
            verified: self.verified,
            failed: self.failed,
            failure_rate: self.failed as f64 / (self.verified + self.failed).max(1) as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_hash_deterministic() {
        assert_eq!(fast_hash(b"hello"), fast_hash(b"hello"));
        assert_ne!(fast_hash(b"hello"), fast_hash(b"hellp"));
    }

    #[test]
    fn test_verify_counts() {
        let mut verifier = IntegrityVerifier::default();
        let h = fast_hash(b"data");
        assert!(verifier.verify(b"data", h));
        assert!(!verifier.verify(b"datb", h));
        let stats = verifier.stats();
        assert_eq!(stats.verified, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.failure_rate, 0.5);
    }

    #[test]
    fn test_delta_expansion_bounds() {
        let verifier = IntegrityVerifier::default();
        assert!(verifier.check_delta_expansion(1000, 5000));
        assert!(!verifier.check_delta_expansion(10, 2000));
        assert!(verifier.check_delta_expansion(0, 1024));
        assert!(!verifier.check_delta_expansion(0, 2 * 1024 * 1024));
    }

    #[test]
    fn test_ref_count_ceiling() {
        let verifier = IntegrityVerifier::default();
        assert!(verifier.check_ref_count(1000));
        assert!(!verifier.check_ref_count(1001));
    }
}
