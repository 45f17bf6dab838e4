//! Determinism primitives for reproducible bundle hashes and files.
//!
//! - **CAC-JSON canonicalization**: the single canonical encoding used by
//!   both the signer and the auditor when hashing bundle content
//! - **Atomic file writes**: bundles are either fully written or not
//!   written, so a reader polling a directory never sees a partial file

mod atomic_write;
mod canonicalize_json;

pub use atomic_write::{AtomicWriteError, write_atomic};
pub use canonicalize_json::{
    CANONICALIZER_ID, CacJsonError, MAX_DEPTH, canonicalize_value, to_canonical_bytes,
};
