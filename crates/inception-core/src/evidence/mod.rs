//! Evidence bundles: the data model and everything that operates on it.
//!
//! - [`types`]: envelopes, bundles, signed and blended bundles
//! - [`envelope`]: collapsing miner claims into an envelope
//! - [`audit`]: attesting bundles and verifying attestations
//! - [`blend`]: reconciling two bundles
//! - [`repository`]: storing bundles by name

pub mod audit;
pub mod blend;
pub mod envelope;
pub mod repository;
pub mod types;

#[cfg(test)]
mod tests;

pub use audit::{
    AuditError, attest_bundle, audit, audit_attestation, audit_detailed, audit_with_trusted,
};
pub use blend::{Blender, blend, reconcile};
pub use envelope::{
    Claim, ClaimPattern, EnvelopeBuilder, EnvelopeError, NO_AUTHENTICATED_CLAIMS,
    PluralityEnvelopeBuilder, simulate_claims,
};
pub use repository::{
    BundleEntry, BundleFilter, BundleRepository, FsBundleRepository, LatestBundle,
    MemoryBundleRepository, RepositoryError, load_latest, load_latest_audited, timestamped_name,
};
pub use types::{
    AgreementState, BlendSource, BlendedBundle, BlendedDecision, BlendedEvidence, Decision,
    DiffField, Envelope, EvidenceBundle, EvidenceSummary, Provenance, SignedBundle,
};

pub use crate::crypto::Attestation;
