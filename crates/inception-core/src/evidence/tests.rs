//! Property tests for blending and auditing.

#![allow(clippy::needless_pass_by_value)]

use proptest::prelude::*;

use super::*;
use crate::clock::FixedClock;
use crate::crypto::Attestor;

// ============================================================================
// Strategies
// ============================================================================

fn arb_decision() -> impl Strategy<Value = Decision> {
    prop::sample::select(vec![Decision::Allow, Decision::Deny, Decision::Escalate])
}

fn arb_agreement_state() -> impl Strategy<Value = AgreementState> {
    prop::sample::select(vec![
        AgreementState::Unanimous,
        AgreementState::Majority,
        AgreementState::Split,
        AgreementState::Escalated,
    ])
}

/// Printable Unicode, plus decomposed sequences that are not NFC.
fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "\\PC{0,24}",
        ("[a-z ]{0,8}", "[a-z ]{0,8}").prop_map(|(head, tail)| format!("{head}e\u{0301}{tail}")),
        Just("A\u{030A}ngstro\u{0308}m".to_string()),
    ]
}

/// Small counts, plus values at the top of the u64 range.
fn arb_count() -> impl Strategy<Value = u64> {
    prop_oneof![
        0..1_000u64,
        any::<u64>(),
        (u64::MAX - 16)..=u64::MAX,
    ]
}

fn arb_replay_hash() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some(String::new())),
        "[0-9a-f]{8}".prop_map(Some),
    ]
}

fn arb_summary() -> impl Strategy<Value = EvidenceSummary> {
    (arb_count(), arb_count(), arb_count(), arb_replay_hash()).prop_map(
        |(total_claims, group_count, distinct_miners, replay_hash)| EvidenceSummary {
            total_claims,
            group_count,
            distinct_miners,
            replay_hash,
        },
    )
}

fn arb_bundle() -> impl Strategy<Value = EvidenceBundle> {
    (
        "[a-z]{3}-[0-9]{4}",
        arb_decision(),
        arb_text(),
        arb_agreement_state(),
        arb_summary(),
        prop::collection::vec("task-[0-9]{2}", 0..4),
    )
        .prop_map(|(id, decision, rationale, agreement_state, evidence, task_ids)| {
            EvidenceBundle::new(
                id,
                Envelope {
                    decision,
                    rationale,
                    agreement_state,
                    evidence,
                },
                Provenance {
                    task_ids,
                    ..Provenance::default()
                },
            )
        })
}

/// Changes exactly one field of `bundle`, selected by `which`.
fn mutate(bundle: &mut EvidenceBundle, which: u8) {
    let envelope = &mut bundle.envelope;
    match which % 7 {
        0 => bundle.decision_id.push('x'),
        1 => {
            envelope.decision = match envelope.decision {
                Decision::Allow => Decision::Deny,
                Decision::Deny | Decision::Escalate => Decision::Allow,
            };
        },
        2 => envelope.rationale.push('!'),
        3 => {
            envelope.agreement_state = match envelope.agreement_state {
                AgreementState::Unanimous => AgreementState::Split,
                _ => AgreementState::Unanimous,
            };
        },
        4 => envelope.evidence.total_claims ^= 1,
        5 => envelope.evidence.replay_hash = Some("tampered".to_string()),
        _ => bundle.provenance.task_ids.push("task-extra".to_string()),
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Repeated blends differ only in `id` and `createdAt`.
    #[test]
    fn prop_blend_is_deterministic(a in arb_bundle(), b in arb_bundle()) {
        let first = Blender::with_clock(FixedClock::new(1)).blend("a.json", &a, "b.json", &b);
        let second = Blender::with_clock(FixedClock::new(2)).blend("a.json", &a, "b.json", &b);

        prop_assert_eq!(&first.blended, &second.blended);
        prop_assert_eq!(&first.sources, &second.sources);
        prop_assert_ne!(first.id, second.id);
    }

    /// Blended counts are the sums of the source counts, saturating at
    /// `u64::MAX`.
    #[test]
    fn prop_counts_are_summed(a in arb_bundle(), b in arb_bundle()) {
        let out = reconcile(&a, &b);
        let (ea, eb) = (&a.envelope.evidence, &b.envelope.evidence);

        prop_assert_eq!(out.evidence.total_claims, ea.total_claims.saturating_add(eb.total_claims));
        prop_assert_eq!(out.evidence.group_count, ea.group_count.saturating_add(eb.group_count));
        prop_assert_eq!(
            out.evidence.distinct_miners,
            ea.distinct_miners.saturating_add(eb.distinct_miners)
        );
    }

    /// Differing decisions escalate and are reported; equal ones pass through.
    #[test]
    fn prop_decision_escalation(a in arb_bundle(), b in arb_bundle()) {
        let out = reconcile(&a, &b);
        let differs = out.diffs.contains(&DiffField::Decision);

        if a.envelope.decision == b.envelope.decision {
            prop_assert_eq!(out.decision, a.envelope.decision);
            prop_assert!(!differs);
        } else {
            prop_assert_eq!(out.decision, Decision::Escalate);
            prop_assert!(differs);
        }
    }

    /// Differing agreement states escalate and are reported.
    #[test]
    fn prop_agreement_state_escalation(a in arb_bundle(), b in arb_bundle()) {
        let out = reconcile(&a, &b);
        let differs = out.diffs.contains(&DiffField::AgreementState);

        if a.envelope.agreement_state == b.envelope.agreement_state {
            prop_assert_eq!(out.agreement_state, a.envelope.agreement_state);
            prop_assert!(!differs);
        } else {
            prop_assert_eq!(out.agreement_state, AgreementState::Escalated);
            prop_assert!(differs);
        }
    }

    /// Diffs are a subsequence of the fixed check order.
    #[test]
    fn prop_diffs_follow_check_order(a in arb_bundle(), b in arb_bundle()) {
        let diffs = reconcile(&a, &b).diffs;
        let positions: Vec<usize> = diffs
            .iter()
            .map(|d| DiffField::CHECK_ORDER.iter().position(|f| f == d).unwrap())
            .collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    /// Only non-empty replay hashes survive, A before B.
    #[test]
    fn prop_replay_hashes_filtered(a in arb_bundle(), b in arb_bundle()) {
        let expected: Vec<String> = [&a.envelope.evidence.replay_hash, &b.envelope.evidence.replay_hash]
            .into_iter()
            .flatten()
            .filter(|h| !h.is_empty())
            .cloned()
            .collect();

        prop_assert_eq!(reconcile(&a, &b).evidence.replay_hash, expected);
    }

    /// A bundle blended with itself has no diffs.
    #[test]
    fn prop_self_blend_has_no_diffs(a in arb_bundle()) {
        let out = reconcile(&a, &a.clone());
        prop_assert!(out.diffs.is_empty());
        prop_assert_eq!(out.decision, a.envelope.decision);
        prop_assert_eq!(out.agreement_state, a.envelope.agreement_state);
    }

    /// Sign-then-audit passes under the signer's key only.
    #[test]
    fn prop_audit_round_trip(
        bundle in arb_bundle(),
        seed in any::<[u8; 32]>(),
        other_seed in any::<[u8; 32]>(),
    ) {
        prop_assume!(seed != other_seed);
        let attestor = Attestor::from_seed("sim-attestor", seed);
        let signed = attest_bundle(&bundle, &attestor)
            .unwrap_or_else(|e| panic!("every generated bundle must attest: {e}"));

        prop_assert!(audit(&signed, &attestor.identity()));

        let other = Attestor::from_seed("sim-attestor", other_seed);
        prop_assert!(!audit(&signed, &other.identity()));
    }

    /// Any single-field edit after signing fails the audit.
    #[test]
    fn prop_mutation_fails_audit(bundle in arb_bundle(), which in any::<u8>()) {
        let attestor = Attestor::from_seed("sim-attestor", [0x42; 32]);
        let mut signed = attest_bundle(&bundle, &attestor).unwrap();

        mutate(&mut signed.bundle, which);

        prop_assert!(!audit(&signed, &attestor.identity()));
    }
}
