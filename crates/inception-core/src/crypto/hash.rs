//! BLAKE3 content hashing for evidence bundles and claim sets.

use serde::Serialize;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::determinism::{CacJsonError, to_canonical_bytes};

/// Size of a BLAKE3 hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Type alias for a 32-byte hash.
pub type Hash = [u8; HASH_SIZE];

/// Domain separator for evidence bundle content hashes.
pub const BUNDLE_HASH_DOMAIN: &[u8] = b"inception:evidence_bundle:v1\0";

/// Domain separator for claim-set replay hashes.
pub const REPLAY_HASH_DOMAIN: &[u8] = b"inception:claim_replay:v1\0";

/// Errors that can occur while producing or parsing content hashes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    /// The value could not be canonicalized.
    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] CacJsonError),

    /// A hex-encoded hash was malformed.
    #[error("invalid hash encoding: {reason}")]
    InvalidEncoding {
        /// Why the encoding was rejected.
        reason: String,
    },
}

/// Hasher for serde values using the canonical JSON encoding.
///
/// Every hash is `blake3(domain || canonical_json(value))`. Producers and
/// verifiers must go through the same domain so a replay hash can never be
/// confused with a bundle hash.
pub struct ContentHasher;

impl ContentHasher {
    /// Hashes the canonical encoding of `value` under `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Canonicalization`] if the value violates the
    /// CAC-JSON profile (floats or excessive depth).
    pub fn hash_value<T: Serialize + ?Sized>(domain: &[u8], value: &T) -> Result<Hash, HashError> {
        let canonical = to_canonical_bytes(value)?;
        Ok(Self::hash_bytes(domain, &canonical))
    }

    /// Hashes raw bytes under `domain`.
    #[must_use]
    pub fn hash_bytes(domain: &[u8], content: &[u8]) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain);
        hasher.update(content);
        *hasher.finalize().as_bytes()
    }

    /// Constant-time comparison of two hashes.
    #[must_use]
    pub fn hashes_equal(a: &Hash, b: &Hash) -> bool {
        a.ct_eq(b).into()
    }
}

/// Encodes a hash as lowercase hex.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

/// Parses a lowercase or uppercase hex hash.
///
/// # Errors
///
/// Returns [`HashError::InvalidEncoding`] if the input is not valid hex or is
/// not exactly [`HASH_SIZE`] bytes long.
pub fn hash_from_hex(encoded: &str) -> Result<Hash, HashError> {
    let bytes = hex::decode(encoded).map_err(|e| HashError::InvalidEncoding {
        reason: e.to_string(),
    })?;
    Hash::try_from(bytes.as_slice()).map_err(|_| HashError::InvalidEncoding {
        reason: format!("expected {HASH_SIZE} bytes, got {}", bytes.len()),
    })
}
