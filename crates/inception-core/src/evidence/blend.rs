//! Deterministic reconciliation of two independently attested bundles.
//!
//! The blender compares four fields in a fixed order and records every
//! field that differed. It never chooses between the sources:
//!
//! | Field            | Equal          | Different              |
//! |------------------|----------------|------------------------|
//! | `decision`       | shared value   | [`Decision::Escalate`] |
//! | `agreementState` | shared value   | [`AgreementState::Escalated`] |
//! | `rationale`      | both, labelled | both, labelled         |
//! | `replayHash`     | both non-empty | both non-empty         |
//!
//! Claim counts are summed. The two sources are assumed to come from
//! different computation paths, so miners are not deduplicated.
//!
//! Blending performs no audit. Callers audit both inputs first.

use tracing::debug;

use super::repository::timestamped_name;
use super::types::{
    AgreementState, BlendSource, BlendedBundle, BlendedDecision, BlendedEvidence, Decision,
    DiffField, EvidenceBundle,
};
use crate::clock::{Clock, SystemClock};

/// Blends two bundles using the system clock for `id` and `createdAt`.
///
/// Total over all inputs and free of side effects apart from reading the
/// clock. See [`Blender::blend`].
#[must_use]
pub fn blend(
    path_a: &str,
    bundle_a: &EvidenceBundle,
    path_b: &str,
    bundle_b: &EvidenceBundle,
) -> BlendedBundle {
    Blender::with_clock(SystemClock).blend(path_a, bundle_a, path_b, bundle_b)
}

/// Bundle blender with an injectable clock.
#[derive(Debug, Clone, Default)]
pub struct Blender<C = SystemClock> {
    clock: C,
}

impl<C: Clock> Blender<C> {
    /// Creates a blender reading time from `clock`.
    #[must_use]
    pub const fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// Reconciles bundle A and bundle B into a fresh [`BlendedBundle`].
    ///
    /// Repeated calls with the same inputs yield identical `blended`
    /// content; only `id` and `createdAt` change.
    #[must_use]
    pub fn blend(
        &self,
        path_a: &str,
        bundle_a: &EvidenceBundle,
        path_b: &str,
        bundle_b: &EvidenceBundle,
    ) -> BlendedBundle {
        let blended = reconcile(bundle_a, bundle_b);
        let created_at = self.clock.now_millis();

        debug!(
            decision_a = %bundle_a.decision_id,
            decision_b = %bundle_b.decision_id,
            blended_decision = %blended.decision,
            diff_count = blended.diffs.len(),
            "blended evidence bundles"
        );

        BlendedBundle {
            id: timestamped_name("blended", created_at),
            sources: vec![
                BlendSource {
                    path: path_a.to_string(),
                    bundle: bundle_a.clone(),
                },
                BlendSource {
                    path: path_b.to_string(),
                    bundle: bundle_b.clone(),
                },
            ],
            blended,
            created_at,
        }
    }
}

/// The clock-free part of a blend.
#[must_use]
pub fn reconcile(a: &EvidenceBundle, b: &EvidenceBundle) -> BlendedDecision {
    let (ea, eb) = (&a.envelope, &b.envelope);

    let diffs = DiffField::CHECK_ORDER
        .into_iter()
        .filter(|field| match field {
            DiffField::Decision => ea.decision != eb.decision,
            DiffField::Rationale => ea.rationale != eb.rationale,
            DiffField::AgreementState => ea.agreement_state != eb.agreement_state,
            DiffField::ReplayHash => ea.evidence.replay_hash != eb.evidence.replay_hash,
        })
        .collect();

    let decision = if ea.decision == eb.decision {
        ea.decision
    } else {
        Decision::Escalate
    };

    let agreement_state = if ea.agreement_state == eb.agreement_state {
        ea.agreement_state
    } else {
        AgreementState::Escalated
    };

    let rationale = format!(
        "Source A ({}): {}\nSource B ({}): {}",
        a.decision_id, ea.rationale, b.decision_id, eb.rationale
    );

    let evidence = BlendedEvidence {
        total_claims: ea.evidence.total_claims.saturating_add(eb.evidence.total_claims),
        group_count: ea.evidence.group_count.saturating_add(eb.evidence.group_count),
        distinct_miners: ea
            .evidence
            .distinct_miners
            .saturating_add(eb.evidence.distinct_miners),
        replay_hash: [&ea.evidence.replay_hash, &eb.evidence.replay_hash]
            .into_iter()
            .flatten()
            .filter(|hash| !hash.is_empty())
            .cloned()
            .collect(),
    };

    BlendedDecision {
        decision,
        agreement_state,
        rationale,
        evidence,
        diffs,
    }
}
