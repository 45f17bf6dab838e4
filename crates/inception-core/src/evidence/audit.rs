//! Attestation and audit of evidence bundles.
//!
//! # Audit order
//!
//! 1. Recompute the bundle's content hash from its canonical encoding.
//! 2. Compare it, in constant time, with the hash the signer attested to
//!    (and with the hash stored beside the bundle).
//! 3. Check the attestation names the expected signer.
//! 4. Check the attestation declares [`ATTESTATION_ALGORITHM`].
//! 5. Verify the Ed25519 signature over the recomputed hash.
//!
//! A tampered bundle fails at step 2, a forged signature at step 5.
//! [`audit`] collapses every failure to `false`; [`audit_detailed`] keeps
//! the reason.
//!
//! # Usage contract
//!
//! The blender never audits. A caller that blends two bundles must audit
//! each of them first; a blended bundle does not inherit validity from its
//! sources.

use ed25519_dalek::Verifier as _;
use thiserror::Error;
use tracing::warn;

use super::types::{EvidenceBundle, SignedBundle};
use crate::crypto::{
    ATTESTATION_ALGORITHM, Attestation, Attestor, AttestorIdentity, ContentHasher, HashError,
    hash_from_hex, hash_to_hex, parse_signature,
};

/// Reasons an audit fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuditError {
    /// The bundle could not be canonicalized for hashing.
    #[error("cannot recompute bundle hash: {reason}")]
    Canonicalization {
        /// The canonicalization failure.
        reason: String,
    },

    /// A recorded hash is not a valid 32-byte hex string.
    #[error("malformed recorded hash: {reason}")]
    MalformedHash {
        /// Why the hash was rejected.
        reason: String,
    },

    /// The recomputed hash differs from the recorded one.
    #[error("bundle hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// The recorded hash (hex).
        expected: String,
        /// The recomputed hash (hex).
        actual: String,
    },

    /// The attestation names a different signer.
    #[error("signer mismatch: expected {expected}, found {found}")]
    SignerMismatch {
        /// The identity the auditor was given.
        expected: String,
        /// The signer named in the attestation.
        found: String,
    },

    /// No trusted identity matches the attestation's signer.
    #[error("no trusted identity for signer {signer}")]
    UnknownSigner {
        /// The signer named in the attestation.
        signer: String,
    },

    /// The attestation was produced under a scheme this auditor does not
    /// verify.
    #[error("unsupported attestation algorithm {algorithm}, expected {}", ATTESTATION_ALGORITHM)]
    UnsupportedAlgorithm {
        /// The algorithm label recorded in the attestation.
        algorithm: String,
    },

    /// The signature could not be decoded.
    #[error("malformed signature: {reason}")]
    MalformedSignature {
        /// Why the signature was rejected.
        reason: String,
    },

    /// The signature does not verify under the signer's key.
    #[error("signature verification failed for signer {signer}")]
    SignatureInvalid {
        /// The signer named in the attestation.
        signer: String,
    },
}

/// Hashes `bundle` and signs the hash with `attestor`.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] if the bundle cannot be
/// canonicalized.
pub fn attest_bundle(bundle: &EvidenceBundle, attestor: &Attestor) -> Result<SignedBundle, HashError> {
    let hash = bundle.content_hash()?;
    Ok(SignedBundle {
        bundle: bundle.clone(),
        hash: hash_to_hex(&hash),
        attestation: attestor.sign(&hash),
    })
}

/// Verifies `attestation` over `bundle` against `identity`.
///
/// # Errors
///
/// Returns the first [`AuditError`] encountered in audit order.
pub fn audit_attestation(
    bundle: &EvidenceBundle,
    attestation: &Attestation,
    identity: &AttestorIdentity,
) -> Result<(), AuditError> {
    let recomputed = bundle
        .content_hash()
        .map_err(|e| AuditError::Canonicalization {
            reason: e.to_string(),
        })?;

    let attested = hash_from_hex(&attestation.hash).map_err(|e| AuditError::MalformedHash {
        reason: e.to_string(),
    })?;
    if !ContentHasher::hashes_equal(&attested, &recomputed) {
        return Err(AuditError::HashMismatch {
            expected: attestation.hash.clone(),
            actual: hash_to_hex(&recomputed),
        });
    }

    if attestation.signer != identity.id() {
        return Err(AuditError::SignerMismatch {
            expected: identity.id().to_string(),
            found: attestation.signer.clone(),
        });
    }

    if attestation.algorithm != ATTESTATION_ALGORITHM {
        return Err(AuditError::UnsupportedAlgorithm {
            algorithm: attestation.algorithm.clone(),
        });
    }

    let signature =
        parse_signature(&attestation.signature).map_err(|e| AuditError::MalformedSignature {
            reason: e.to_string(),
        })?;
    identity
        .verifying_key()
        .verify(&recomputed, &signature)
        .map_err(|_| AuditError::SignatureInvalid {
            signer: attestation.signer.clone(),
        })
}

/// Audits a signed bundle against `identity`, including the hash stored
/// beside the bundle.
///
/// # Errors
///
/// Returns the first [`AuditError`] encountered in audit order.
pub fn audit_detailed(signed: &SignedBundle, identity: &AttestorIdentity) -> Result<(), AuditError> {
    if signed.hash != signed.attestation.hash {
        return Err(AuditError::HashMismatch {
            expected: signed.attestation.hash.clone(),
            actual: signed.hash.clone(),
        });
    }
    audit_attestation(&signed.bundle, &signed.attestation, identity)
}

/// Audits a signed bundle against `identity`. Every failure is `false`.
#[must_use]
pub fn audit(signed: &SignedBundle, identity: &AttestorIdentity) -> bool {
    match audit_detailed(signed, identity) {
        Ok(()) => true,
        Err(error) => {
            warn!(
                decision_id = %signed.bundle.decision_id,
                signer = %signed.attestation.signer,
                %error,
                "bundle audit failed"
            );
            false
        },
    }
}

/// Audits a signed bundle against whichever trusted identity matches its
/// signer, returning that identity.
///
/// # Errors
///
/// Returns [`AuditError::UnknownSigner`] if no identity matches, otherwise
/// the first [`AuditError`] from [`audit_detailed`].
pub fn audit_with_trusted<'a>(
    signed: &SignedBundle,
    trusted: &'a [AttestorIdentity],
) -> Result<&'a AttestorIdentity, AuditError> {
    let identity = trusted
        .iter()
        .find(|identity| identity.id() == signed.attestation.signer)
        .ok_or_else(|| AuditError::UnknownSigner {
            signer: signed.attestation.signer.clone(),
        })?;
    audit_detailed(signed, identity)?;
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::types::{AgreementState, Decision, Envelope, EvidenceSummary, Provenance};

    fn sample_bundle() -> EvidenceBundle {
        EvidenceBundle::new(
            "decision-42",
            Envelope {
                decision: Decision::Allow,
                rationale: "3/3 miners returned ALLOW".to_string(),
                agreement_state: AgreementState::Unanimous,
                evidence: EvidenceSummary {
                    total_claims: 3,
                    group_count: 1,
                    distinct_miners: 3,
                    replay_hash: Some("abc".to_string()),
                },
            },
            Provenance {
                session_id: Some("session-1".to_string()),
                task_ids: vec!["task-1".to_string()],
                source: Some("simulation".to_string()),
                ..Provenance::default()
            },
        )
    }

    fn signer() -> Attestor {
        Attestor::from_seed("sim-attestor", [0x5a; 32])
    }

    #[test]
    fn test_audit_round_trip_passes() {
        let attestor = signer();
        let signed = attest_bundle(&sample_bundle(), &attestor).unwrap();

        assert_eq!(audit_detailed(&signed, &attestor.identity()), Ok(()));
        assert!(audit(&signed, &attestor.identity()));
    }

    #[test]
    fn test_tampered_bundle_is_hash_mismatch() {
        let attestor = signer();
        let mut signed = attest_bundle(&sample_bundle(), &attestor).unwrap();
        signed.bundle.envelope.decision = Decision::Deny;

        assert!(matches!(
            audit_detailed(&signed, &attestor.identity()),
            Err(AuditError::HashMismatch { .. })
        ));
        assert!(!audit(&signed, &attestor.identity()));
    }

    #[test]
    fn test_tampered_provenance_is_hash_mismatch() {
        let attestor = signer();
        let mut signed = attest_bundle(&sample_bundle(), &attestor).unwrap();
        signed.bundle.provenance.task_ids.push("task-2".to_string());

        assert!(!audit(&signed, &attestor.identity()));
    }

    #[test]
    fn test_other_key_same_id_is_signature_invalid() {
        let signed = attest_bundle(&sample_bundle(), &signer()).unwrap();
        let impostor = Attestor::from_seed("sim-attestor", [0x11; 32]);

        assert_eq!(
            audit_detailed(&signed, &impostor.identity()),
            Err(AuditError::SignatureInvalid {
                signer: "sim-attestor".to_string()
            })
        );
    }

    #[test]
    fn test_other_signer_id_is_signer_mismatch() {
        let signed = attest_bundle(&sample_bundle(), &signer()).unwrap();
        let other = Attestor::from_seed("llm-attestor", [0x5a; 32]);

        assert!(matches!(
            audit_detailed(&signed, &other.identity()),
            Err(AuditError::SignerMismatch { .. })
        ));
    }

    #[test]
    fn test_forged_signature_fails() {
        let attestor = signer();
        let mut signed = attest_bundle(&sample_bundle(), &attestor).unwrap();
        signed.attestation.signature = "00".repeat(64);
        assert!(matches!(
            audit_detailed(&signed, &attestor.identity()),
            Err(AuditError::SignatureInvalid { .. })
        ));

        signed.attestation.signature = "zz".to_string();
        assert!(matches!(
            audit_detailed(&signed, &attestor.identity()),
            Err(AuditError::MalformedSignature { .. })
        ));
        assert!(!audit(&signed, &attestor.identity()));
    }

    #[test]
    fn test_rehashed_tamper_still_fails_signature() {
        // An attacker who edits the bundle and rewrites both recorded hashes
        // still cannot produce a valid signature.
        let attestor = signer();
        let mut signed = attest_bundle(&sample_bundle(), &attestor).unwrap();
        signed.bundle.envelope.rationale = "edited".to_string();
        let rehashed = hash_to_hex(&signed.bundle.content_hash().unwrap());
        signed.hash.clone_from(&rehashed);
        signed.attestation.hash = rehashed;

        assert!(matches!(
            audit_detailed(&signed, &attestor.identity()),
            Err(AuditError::SignatureInvalid { .. })
        ));
    }

    #[test]
    fn test_stored_hash_disagreeing_with_attestation_fails() {
        let attestor = signer();
        let mut signed = attest_bundle(&sample_bundle(), &attestor).unwrap();
        signed.hash = "11".repeat(32);

        assert!(matches!(
            audit_detailed(&signed, &attestor.identity()),
            Err(AuditError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_malformed_recorded_hash() {
        let attestor = signer();
        let mut signed = attest_bundle(&sample_bundle(), &attestor).unwrap();
        signed.hash = "xyz".to_string();
        signed.attestation.hash = "xyz".to_string();

        assert!(matches!(
            audit_detailed(&signed, &attestor.identity()),
            Err(AuditError::MalformedHash { .. })
        ));
    }

    #[test]
    fn test_audit_with_trusted_selects_by_signer() {
        let sim = signer();
        let llm = Attestor::from_seed("llm-attestor", [0x77; 32]);
        let trusted = [llm.identity(), sim.identity()];

        let signed = attest_bundle(&sample_bundle(), &sim).unwrap();
        let matched = audit_with_trusted(&signed, &trusted).unwrap();
        assert_eq!(matched.id(), "sim-attestor");

        let stranger = Attestor::from_seed("stranger", [0x01; 32]);
        let unsigned = attest_bundle(&sample_bundle(), &stranger).unwrap();
        assert_eq!(
            audit_with_trusted(&unsigned, &trusted),
            Err(AuditError::UnknownSigner {
                signer: "stranger".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_algorithm_label_fails() {
        let attestor = signer();
        let mut signed = attest_bundle(&sample_bundle(), &attestor).unwrap();
        signed.attestation.algorithm = "rsa-sha256-cac-json-v1".to_string();

        assert_eq!(
            audit_detailed(&signed, &attestor.identity()),
            Err(AuditError::UnsupportedAlgorithm {
                algorithm: "rsa-sha256-cac-json-v1".to_string()
            })
        );
        assert!(!audit(&signed, &attestor.identity()));
    }

    #[test]
    fn test_decomposed_text_and_max_counts_attest() {
        let mut bundle = sample_bundle();
        bundle.envelope.rationale = "cafe\u{0301} ok".to_string();
        bundle.envelope.evidence.total_claims = u64::MAX;
        bundle.envelope.evidence.distinct_miners = u64::MAX;

        let attestor = signer();
        let signed = attest_bundle(&bundle, &attestor).unwrap();
        assert_eq!(audit_detailed(&signed, &attestor.identity()), Ok(()));

        // The composed spelling is a different byte string, so it is an edit.
        let mut recomposed = signed.clone();
        recomposed.bundle.envelope.rationale = "caf\u{00e9} ok".to_string();
        assert!(matches!(
            audit_detailed(&recomposed, &attestor.identity()),
            Err(AuditError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_signed_bundle_survives_json_round_trip() {
        let attestor = signer();
        let signed = attest_bundle(&sample_bundle(), &attestor).unwrap();

        let json = serde_json::to_string_pretty(&signed).unwrap();
        let reloaded: SignedBundle = serde_json::from_str(&json).unwrap();
        assert!(audit(&reloaded, &attestor.identity()));
    }
}
