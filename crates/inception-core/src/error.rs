//! Crate-level error type.
//!
//! Each module keeps its own error enum; [`InceptionError`] lets callers
//! that span several modules propagate any of them with `?`.

use thiserror::Error;

use crate::config::ConfigError;
use crate::crypto::{AttestorError, HashError};
use crate::determinism::{AtomicWriteError, CacJsonError};
use crate::evidence::{AuditError, RepositoryError};

/// Any error produced by this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InceptionError {
    /// Canonical JSON encoding failed.
    #[error(transparent)]
    Canonicalization(#[from] CacJsonError),

    /// Content hashing failed.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// Key loading, saving or signing failed.
    #[error(transparent)]
    Attestor(#[from] AttestorError),

    /// A bundle failed its audit.
    #[error("audit failed: {0}")]
    Audit(#[from] AuditError),

    /// Bundle storage failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An atomic file write failed.
    #[error(transparent)]
    Write(#[from] AtomicWriteError),
}

impl InceptionError {
    /// Returns true if this is an audit failure rather than an operational
    /// error.
    #[must_use]
    pub const fn is_audit_failure(&self) -> bool {
        matches!(self, Self::Audit(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_errors_are_distinguished() {
        let err = InceptionError::from(AuditError::UnknownSigner {
            signer: "x".to_string(),
        });
        assert!(err.is_audit_failure());
        assert_eq!(err.to_string(), "audit failed: no trusted identity for signer x");

        let err = InceptionError::from(RepositoryError::NoBundles {
            location: "bundles/sim".to_string(),
        });
        assert!(!err.is_audit_failure());
        assert_eq!(err.to_string(), "no bundle files in bundles/sim");
    }
}
