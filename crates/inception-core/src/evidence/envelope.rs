//! Collapsing miner claims into a consensus envelope.
//!
//! [`PluralityEnvelopeBuilder`] is the reference builder used by the
//! `simulate` command; production envelopes may come from any
//! [`EnvelopeBuilder`].
//!
//! A single source only ever decides `ALLOW` or `DENY`. `ESCALATE` is the
//! blender's verdict on disagreeing sources, so claims carrying it are
//! refused here.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{AgreementState, Decision, Envelope, EvidenceSummary};
use crate::crypto::{ContentHasher, HashError, REPLAY_HASH_DOMAIN, hash_to_hex};

/// One miner's reported output for an inference task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    /// Miner id.
    pub miner: String,
    /// Decision the miner reported.
    pub decision: Decision,
    /// Miner-supplied justification.
    pub rationale: String,
    /// Whether the claim's origin was authenticated by the router.
    pub authenticated: bool,
}

/// Errors from building or simulating a claim set.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnvelopeError {
    /// An authenticated claim reported `ESCALATE`.
    #[error("miner {miner} claimed ESCALATE; single-source claims must be ALLOW or DENY")]
    EscalateClaim {
        /// The offending miner.
        miner: String,
    },

    /// A simulation was asked to favour `ESCALATE`.
    #[error("cannot simulate claims for ESCALATE; choose ALLOW or DENY")]
    EscalatePrimary,

    /// The replay hash could not be computed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Builds an envelope from a claim set.
pub trait EnvelopeBuilder {
    /// Collapses `claims` into one envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::EscalateClaim`] if a counted claim reports
    /// `ESCALATE`, or [`EnvelopeError::Hash`] if the replay hash cannot be
    /// computed.
    fn build(&self, claims: &[Claim]) -> Result<Envelope, EnvelopeError>;
}

/// Plurality vote over authenticated claims.
///
/// - Unauthenticated claims are ignored.
/// - An authenticated `ESCALATE` claim is an error.
/// - The largest decision group wins; ties go to the more conservative
///   decision (`DENY` over `ALLOW`).
/// - One group is `UNANIMOUS`, a winner above half is `MAJORITY`, anything
///   else is `SPLIT`.
/// - With no authenticated claims the envelope is `DENY`/`SPLIT`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PluralityEnvelopeBuilder;

/// Rationale of the envelope built from an empty authenticated claim set.
pub const NO_AUTHENTICATED_CLAIMS: &str = "no authenticated claims";

struct Group<'a> {
    decision: Decision,
    count: u64,
    rationale: &'a str,
}

impl EnvelopeBuilder for PluralityEnvelopeBuilder {
    fn build(&self, claims: &[Claim]) -> Result<Envelope, EnvelopeError> {
        let counted: Vec<&Claim> = claims.iter().filter(|c| c.authenticated).collect();
        if let Some(claim) = counted.iter().find(|c| c.decision == Decision::Escalate) {
            return Err(EnvelopeError::EscalateClaim {
                miner: claim.miner.clone(),
            });
        }

        // First-seen order keeps the chosen rationale stable.
        let mut groups: Vec<Group<'_>> = Vec::new();
        for claim in &counted {
            match groups.iter_mut().find(|g| g.decision == claim.decision) {
                Some(group) => group.count += 1,
                None => groups.push(Group {
                    decision: claim.decision,
                    count: 1,
                    rationale: &claim.rationale,
                }),
            }
        }

        let Some(winner) = groups
            .iter()
            .max_by_key(|g| (g.count, g.decision.conservativeness()))
        else {
            return Ok(Envelope {
                decision: Decision::Deny,
                rationale: NO_AUTHENTICATED_CLAIMS.to_string(),
                agreement_state: AgreementState::Split,
                evidence: EvidenceSummary::default(),
            });
        };

        let total = counted.len() as u64;

        let agreement_state = if groups.len() == 1 {
            AgreementState::Unanimous
        } else if winner.count * 2 > total {
            AgreementState::Majority
        } else {
            AgreementState::Split
        };

        let distinct_miners = counted
            .iter()
            .map(|c| c.miner.as_str())
            .collect::<BTreeSet<_>>()
            .len() as u64;
        let replay_hash = ContentHasher::hash_value(REPLAY_HASH_DOMAIN, &counted)?;

        Ok(Envelope {
            decision: winner.decision,
            rationale: winner.rationale.to_string(),
            agreement_state,
            evidence: EvidenceSummary {
                total_claims: total,
                group_count: groups.len() as u64,
                distinct_miners,
                replay_hash: Some(hash_to_hex(&replay_hash)),
            },
        })
    }
}

/// Claim shapes produced by [`simulate_claims`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimPattern {
    /// Three authenticated claims, all for the primary decision.
    Unanimous,
    /// Two claims for the primary decision, one against.
    Majority,
    /// Two claims each way.
    Split,
    /// Two claims each way plus an unauthenticated claim that must be
    /// ignored.
    Conflict,
}

impl ClaimPattern {
    /// All patterns, in declaration order.
    pub const ALL: [Self; 4] = [Self::Unanimous, Self::Majority, Self::Split, Self::Conflict];

    /// Returns the CLI label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unanimous => "unanimous",
            Self::Majority => "majority",
            Self::Split => "split",
            Self::Conflict => "conflict",
        }
    }
}

impl fmt::Display for ClaimPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!("unknown claim pattern '{s}' (expected unanimous, majority, split or conflict)")
            })
    }
}

/// Generates a deterministic claim set for `pattern`.
///
/// `primary` is the decision favoured by the pattern; `seed` only varies
/// miner ids, so two seeds give different replay hashes for the same shape.
///
/// # Errors
///
/// Returns [`EnvelopeError::EscalatePrimary`] if `primary` is `ESCALATE`.
pub fn simulate_claims(
    pattern: ClaimPattern,
    primary: Decision,
    seed: u64,
) -> Result<Vec<Claim>, EnvelopeError> {
    let opposite = match primary {
        Decision::Allow => Decision::Deny,
        Decision::Deny => Decision::Allow,
        Decision::Escalate => return Err(EnvelopeError::EscalatePrimary),
    };

    let shape: Vec<(Decision, bool)> = match pattern {
        ClaimPattern::Unanimous => vec![(primary, true); 3],
        ClaimPattern::Majority => vec![(primary, true), (primary, true), (opposite, true)],
        ClaimPattern::Split => vec![
            (primary, true),
            (opposite, true),
            (primary, true),
            (opposite, true),
        ],
        ClaimPattern::Conflict => vec![
            (primary, true),
            (opposite, true),
            (opposite, false),
            (primary, true),
            (opposite, true),
        ],
    };

    Ok(shape
        .into_iter()
        .enumerate()
        .map(|(i, (decision, authenticated))| Claim {
            miner: format!("miner-{seed:x}-{i}"),
            decision,
            rationale: format!("miner {i} reported {decision}"),
            authenticated,
        })
        .collect())
}
