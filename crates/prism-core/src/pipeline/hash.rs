//! Content fingerprinting for idempotent processing.
//!
//! A fingerprint is the first 16 hex characters (64 bits) of a BLAKE3
//! digest of the raw upload bytes. It doubles as the cache key and as the
//! storage namespace of every variant, so it is kept short enough to read
//! in a path. At 64 bits a collision becomes likely only around 2^32
//! distinct images; that is accepted for a single catalogue of product
//! photos. Widen `FINGERPRINT_LEN` if the keyspace ever needs to grow.

use blake3::Hasher as Blake3Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of hex characters kept from the digest.
pub const FINGERPRINT_LEN: usize = 16;

/// Truncated content digest, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Accept an externally supplied fingerprint (e.g. from a CLI argument).
    ///
    /// Returns `None` unless it is exactly `FINGERPRINT_LEN` lowercase hex chars.
    pub fn from_hex(s: &str) -> Option<Self> {
        let valid = s.len() == FINGERPRINT_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Computes content fingerprints.
pub struct Hasher;

impl Hasher {
    /// Fingerprint an in-memory byte buffer. Pure and deterministic.
    pub fn fingerprint(data: &[u8]) -> Fingerprint {
        let mut hasher = Blake3Hasher::new();
        hasher.update(data);
        let hex = hasher.finalize().to_hex();
        Fingerprint(hex.as_str()[..FINGERPRINT_LEN].to_string())
    }
}
