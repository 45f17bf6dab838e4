//! # inception-core
//!
//! Evidence bundle blending and attestation verification for Cortensor
//! decision envelopes.
//!
//! Two independent computation paths (for example a simulated claim set and
//! an LLM-backed inference run) each collapse their claims into an
//! [`Envelope`](evidence::Envelope), wrap it in an
//! [`EvidenceBundle`](evidence::EvidenceBundle), and sign the bundle's content
//! hash. This crate provides:
//!
//! - [`determinism`]: canonical JSON used for every content hash
//! - [`crypto`]: BLAKE3 bundle hashing and the Ed25519 [`Attestor`]
//! - [`evidence`]: the data model, the auditor, the blender, the envelope
//!   builder and the bundle repository
//! - [`config`]: TOML configuration for the command-line driver
//!
//! ## Disagreement is data
//!
//! The blender never picks a winner. When the two sources disagree on the
//! decision the blended decision is [`Decision::Escalate`]; when they
//! disagree on the agreement state it is [`AgreementState::Escalated`]. Every
//! field that differed is listed in the blended bundle's `diffs`.
//!
//! ## Example
//!
//! ```rust
//! use inception_core::crypto::Attestor;
//! use inception_core::evidence::{
//!     AgreementState, Decision, Envelope, EvidenceBundle, EvidenceSummary, Provenance,
//!     attest_bundle, audit, blend,
//! };
//!
//! let attestor = Attestor::from_seed("sim-attestor", [7u8; 32]);
//! let envelope = Envelope {
//!     decision: Decision::Allow,
//!     rationale: "all miners agreed".to_string(),
//!     agreement_state: AgreementState::Unanimous,
//!     evidence: EvidenceSummary {
//!         total_claims: 3,
//!         group_count: 1,
//!         distinct_miners: 3,
//!         replay_hash: Some("h1".to_string()),
//!     },
//! };
//! let bundle = EvidenceBundle::new("decision-1", envelope, Provenance::default());
//! let signed = attest_bundle(&bundle, &attestor).unwrap();
//!
//! // Callers audit every input before blending.
//! assert!(audit(&signed, &attestor.identity()));
//!
//! let blended = blend("a.json", &signed.bundle, "b.json", &signed.bundle);
//! assert!(blended.blended.diffs.is_empty());
//! assert_eq!(blended.blended.evidence.total_claims, 6);
//! ```

pub mod clock;
pub mod config;
pub mod crypto;
pub mod determinism;
pub mod error;
pub mod evidence;

pub use crypto::{Attestor, AttestorIdentity};
pub use error::InceptionError;
pub use evidence::{AgreementState, Decision};
