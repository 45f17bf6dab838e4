//! Evidence data model: decisions, envelopes, bundles and blended bundles.
//!
//! All records serialize to camelCase JSON so persisted bundles stay
//! readable by the dashboard that consumes them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::crypto::{Attestation, BUNDLE_HASH_DOMAIN, ContentHasher, Hash, HashError};

/// Outcome of a decision computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    /// The request is permitted.
    Allow,
    /// The request is refused.
    Deny,
    /// Sources disagreed; arbitration is required. Only the blender
    /// produces it; envelope builders refuse it.
    Escalate,
}

impl Decision {
    /// Returns the wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Deny => "DENY",
            Self::Escalate => "ESCALATE",
        }
    }

    /// Rank used to break ties between equally supported decisions; higher
    /// is more conservative.
    #[must_use]
    pub const fn conservativeness(self) -> u8 {
        match self {
            Self::Allow => 0,
            Self::Deny => 1,
            Self::Escalate => 2,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALLOW" => Ok(Self::Allow),
            "DENY" => Ok(Self::Deny),
            "ESCALATE" => Ok(Self::Escalate),
            other => Err(format!("unknown decision: {other}")),
        }
    }
}

/// How strongly the underlying claims agreed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgreementState {
    /// Every counted claim reported the same decision.
    Unanimous,
    /// The winning decision had more than half of the counted claims.
    Majority,
    /// No decision had more than half of the counted claims.
    Split,
    /// Two blended sources reported different agreement states. Produced
    /// only by the blender.
    Escalated,
}

impl AgreementState {
    /// Returns the wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unanimous => "UNANIMOUS",
            Self::Majority => "MAJORITY",
            Self::Split => "SPLIT",
            Self::Escalated => "ESCALATED",
        }
    }
}

impl fmt::Display for AgreementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claim counts and the replay fingerprint of an envelope.
///
/// Missing counts deserialize as `0` and a missing replay hash as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceSummary {
    /// Number of claims counted.
    #[serde(default)]
    pub total_claims: u64,
    /// Number of distinct decision groups among the counted claims.
    #[serde(default)]
    pub group_count: u64,
    /// Number of distinct miners among the counted claims.
    #[serde(default)]
    pub distinct_miners: u64,
    /// Content fingerprint of the claim set, compared for equality only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay_hash: Option<String>,
}

/// Consensus result over a set of claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// The decision the claims converged on.
    pub decision: Decision,
    /// Human-readable justification.
    #[serde(default)]
    pub rationale: String,
    /// Agreement label for the claim set.
    pub agreement_state: AgreementState,
    /// Claim counts and replay fingerprint.
    #[serde(default)]
    pub evidence: EvidenceSummary,
}

/// Session and task identifiers attached to a bundle. Opaque to the
/// blender; unknown fields are carried through and covered by the hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    /// Inference session the claims came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Inference task ids whose claims were counted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub task_ids: Vec<String>,
    /// Computation path label, e.g. `simulation` or `llm`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Any other provenance fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// An envelope with its correlation id and provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceBundle {
    /// Caller-supplied correlation id.
    pub decision_id: String,
    /// The consensus envelope.
    pub envelope: Envelope,
    /// Session/task metadata.
    #[serde(default)]
    pub provenance: Provenance,
}

impl EvidenceBundle {
    /// Creates a bundle.
    #[must_use]
    pub fn new(decision_id: impl Into<String>, envelope: Envelope, provenance: Provenance) -> Self {
        Self {
            decision_id: decision_id.into(),
            envelope,
            provenance,
        }
    }

    /// Computes the bundle's content hash: BLAKE3 over the CAC-JSON
    /// encoding, domain separated by [`BUNDLE_HASH_DOMAIN`].
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Canonicalization`] if the bundle holds values the
    /// canonical profile rejects (for example a float in provenance).
    pub fn content_hash(&self) -> Result<Hash, HashError> {
        ContentHasher::hash_value(BUNDLE_HASH_DOMAIN, self)
    }
}

/// The persisted form of an attested bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedBundle {
    /// The bundle content.
    pub bundle: EvidenceBundle,
    /// Hex content hash recorded at signing time.
    pub hash: String,
    /// Signature over `hash`.
    pub attestation: Attestation,
}

/// A bundle field compared by the blender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiffField {
    /// `envelope.decision`
    Decision,
    /// `envelope.rationale`
    Rationale,
    /// `envelope.agreementState`
    AgreementState,
    /// `envelope.evidence.replayHash`
    ReplayHash,
}

impl DiffField {
    /// Fixed comparison order used by the blender.
    pub const CHECK_ORDER: [Self; 4] = [
        Self::Decision,
        Self::Rationale,
        Self::AgreementState,
        Self::ReplayHash,
    ];

    /// Returns the wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Rationale => "rationale",
            Self::AgreementState => "agreementState",
            Self::ReplayHash => "replayHash",
        }
    }
}

impl fmt::Display for DiffField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summed claim counts and the surviving replay hashes of both sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlendedEvidence {
    /// Sum of both sources' `totalClaims`.
    pub total_claims: u64,
    /// Sum of both sources' `groupCount`.
    pub group_count: u64,
    /// Sum of both sources' `distinctMiners`, without miner deduplication.
    pub distinct_miners: u64,
    /// Non-empty source replay hashes, A before B.
    pub replay_hash: Vec<String>,
}

/// Reconciled decision content of a blended bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlendedDecision {
    /// Shared decision, or `ESCALATE` when the sources disagreed.
    pub decision: Decision,
    /// Shared agreement state, or `ESCALATED` when the sources disagreed.
    pub agreement_state: AgreementState,
    /// Both source rationales, each labelled with its decision id.
    pub rationale: String,
    /// Merged evidence counts.
    pub evidence: BlendedEvidence,
    /// Fields that differed, in [`DiffField::CHECK_ORDER`].
    pub diffs: Vec<DiffField>,
}

/// One input of a blend, with the path label it was loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlendSource {
    /// Opaque path label.
    pub path: String,
    /// The source bundle.
    pub bundle: EvidenceBundle,
}

/// Result of blending two evidence bundles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlendedBundle {
    /// Fresh id, `blended-<createdAt>-<suffix>`.
    pub id: String,
    /// The two sources in call order.
    pub sources: Vec<BlendSource>,
    /// Reconciled content.
    pub blended: BlendedDecision,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_wire_labels() {
        assert_eq!(serde_json::to_string(&Decision::Allow).unwrap(), "\"ALLOW\"");
        assert_eq!(
            serde_json::from_str::<Decision>("\"ESCALATE\"").unwrap(),
            Decision::Escalate
        );
        assert_eq!("deny".parse::<Decision>().unwrap(), Decision::Deny);
        assert!("maybe".parse::<Decision>().is_err());
    }

    #[test]
    fn test_agreement_state_wire_labels() {
        assert_eq!(
            serde_json::to_string(&AgreementState::Escalated).unwrap(),
            "\"ESCALATED\""
        );
        assert_eq!(AgreementState::Majority.to_string(), "MAJORITY");
    }

    #[test]
    fn test_missing_counts_default_to_zero() {
        let envelope: Envelope = serde_json::from_str(
            r#"{"decision":"ALLOW","rationale":"r","agreementState":"SPLIT","evidence":{"groupCount":2}}"#,
        )
        .unwrap();
        assert_eq!(envelope.evidence.total_claims, 0);
        assert_eq!(envelope.evidence.group_count, 2);
        assert_eq!(envelope.evidence.distinct_miners, 0);
        assert_eq!(envelope.evidence.replay_hash, None);

        let bare: Envelope =
            serde_json::from_str(r#"{"decision":"DENY","agreementState":"UNANIMOUS"}"#).unwrap();
        assert_eq!(bare.evidence, EvidenceSummary::default());
        assert!(bare.rationale.is_empty());
    }

    #[test]
    fn test_provenance_carries_unknown_fields() {
        let bundle: EvidenceBundle = serde_json::from_str(
            r#"{"decisionId":"d","envelope":{"decision":"ALLOW","agreementState":"UNANIMOUS"},
                "provenance":{"sessionId":"s-1","taskIds":["t1"],"router":"node-7"}}"#,
        )
        .unwrap();
        assert_eq!(bundle.provenance.session_id.as_deref(), Some("s-1"));
        assert_eq!(
            bundle.provenance.extra.get("router"),
            Some(&serde_json::json!("node-7"))
        );

        let encoded = serde_json::to_value(&bundle).unwrap();
        assert_eq!(encoded["provenance"]["router"], "node-7");
    }

    #[test]
    fn test_content_hash_changes_with_any_field() {
        let bundle: EvidenceBundle = serde_json::from_str(
            r#"{"decisionId":"d","envelope":{"decision":"ALLOW","rationale":"ok","agreementState":"UNANIMOUS"}}"#,
        )
        .unwrap();
        let original = bundle.content_hash().unwrap();
        assert_eq!(original, bundle.clone().content_hash().unwrap());

        let mut renamed = bundle.clone();
        renamed.decision_id = "e".to_string();
        assert_ne!(original, renamed.content_hash().unwrap());

        let mut recounted = bundle;
        recounted.envelope.evidence.total_claims = 1;
        assert_ne!(original, recounted.content_hash().unwrap());
    }

    #[test]
    fn test_diff_field_labels() {
        let labels: Vec<&str> = DiffField::CHECK_ORDER.iter().map(|f| f.as_str()).collect();
        assert_eq!(
            labels,
            ["decision", "rationale", "agreementState", "replayHash"]
        );
        assert_eq!(
            serde_json::to_string(&DiffField::AgreementState).unwrap(),
            "\"agreementState\""
        );
    }
}
