//! Cryptographic primitives for evidence bundles.
//!
//! - **BLAKE3 hashing**: domain-separated hashes over canonical JSON
//! - **Ed25519 attestations**: signatures over bundle hashes, bound to an
//!   attestor id
//!
//! # Example
//!
//! ```rust
//! use inception_core::crypto::{Attestor, BUNDLE_HASH_DOMAIN, ContentHasher};
//!
//! let attestor = Attestor::from_seed("llm-attestor", [3u8; 32]);
//! let hash = ContentHasher::hash_value(BUNDLE_HASH_DOMAIN, &"payload").unwrap();
//! let attestation = attestor.sign(&hash);
//! assert_eq!(attestation.signer, "llm-attestor");
//! ```

mod hash;
mod sign;

pub use hash::{
    BUNDLE_HASH_DOMAIN, ContentHasher, HASH_SIZE, Hash, HashError, REPLAY_HASH_DOMAIN,
    hash_from_hex, hash_to_hex,
};
pub use sign::{
    ATTESTATION_ALGORITHM, Attestation, Attestor, AttestorError, AttestorIdentity, KEY_SIZE,
    KeyAlgorithm, SIGNATURE_SIZE, identity_path_for, parse_signature,
};
