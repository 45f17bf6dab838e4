//! `inception simulate`: produce a signed bundle from a synthetic claim set.
//!
//! The claims come from [`simulate_claims`]; the envelope from
//! [`PluralityEnvelopeBuilder`]. The attested bundle is written as
//! `bundle-<ms>-<suffix>.json` into the output directory.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Args;
use inception_core::Attestor;
use inception_core::clock::{Clock, SystemClock};
use inception_core::config::InceptionConfig;
use inception_core::evidence::{
    BundleRepository, ClaimPattern, Decision, EnvelopeBuilder, EvidenceBundle,
    FsBundleRepository, PluralityEnvelopeBuilder, Provenance, attest_bundle, simulate_claims,
    timestamped_name,
};
use tracing::info;

use super::{exit_codes, print_json, report_error};

/// Arguments for `inception simulate`.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Claim shape: unanimous, majority, split or conflict
    #[arg(long)]
    pub pattern: ClaimPattern,

    /// Decision favoured by the pattern: ALLOW or DENY
    #[arg(long, default_value = "ALLOW", value_parser = parse_source_decision)]
    pub decision: Decision,

    /// Correlation id recorded in the bundle
    #[arg(long)]
    pub decision_id: String,

    /// Output directory [default: paths.simulation_dir]
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Secret key file [default: attestor.key_file]
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// Varies miner ids and therefore the replay hash
    #[arg(long, default_value = "0")]
    pub seed: u64,

    /// Provenance source label
    #[arg(long, default_value = "simulation")]
    pub source: String,

    /// Provenance session id
    #[arg(long)]
    pub session_id: Option<String>,

    /// Print the signed bundle instead of its path
    #[arg(long)]
    pub json: bool,
}

/// Parses a decision a single source may reach. `ESCALATE` is reserved for
/// blended bundles.
fn parse_source_decision(value: &str) -> Result<Decision, String> {
    match value.parse::<Decision>()? {
        Decision::Escalate => {
            Err("ESCALATE is only produced by blending; use ALLOW or DENY".to_string())
        },
        decision => Ok(decision),
    }
}

/// Runs the command and returns its exit code.
pub fn run(args: &SimulateArgs, config: &InceptionConfig) -> u8 {
    match execute(args, config) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => report_error("simulate", &e),
    }
}

fn execute(args: &SimulateArgs, config: &InceptionConfig) -> Result<()> {
    let key_path = args
        .key
        .as_ref()
        .or(config.attestor.key_file.as_ref())
        .ok_or_else(|| anyhow!("no signing key: pass --key or set attestor.key_file"))?;
    let attestor = Attestor::load(key_path)
        .with_context(|| format!("failed to load key {}", key_path.display()))?;

    let claims = simulate_claims(args.pattern, args.decision, args.seed)
        .context("failed to simulate claims")?;
    let envelope = PluralityEnvelopeBuilder
        .build(&claims)
        .context("failed to build envelope")?;
    let bundle = EvidenceBundle::new(
        args.decision_id.clone(),
        envelope,
        Provenance {
            session_id: args.session_id.clone(),
            task_ids: vec![format!("sim-task-{:x}", args.seed)],
            source: Some(args.source.clone()),
            ..Provenance::default()
        },
    );
    let signed = attest_bundle(&bundle, &attestor).context("failed to attest bundle")?;

    let out_dir = args
        .out_dir
        .clone()
        .unwrap_or_else(|| config.paths.simulation_dir.clone());
    let repo = FsBundleRepository::new(out_dir);
    let name = format!("{}.json", timestamped_name("bundle", SystemClock.now_millis()));
    repo.write_json(&name, &signed)
        .with_context(|| format!("failed to write {name}"))?;

    let path = repo.path_of(&name);
    info!(
        path = %path.display(),
        pattern = %args.pattern,
        decision = %signed.bundle.envelope.decision,
        agreement_state = %signed.bundle.envelope.agreement_state,
        signer = %attestor.id(),
        "wrote simulated bundle"
    );

    if args.json {
        print_json(&signed)?;
    } else {
        println!("{}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_decision_excludes_escalate() {
        assert_eq!(parse_source_decision("allow"), Ok(Decision::Allow));
        assert_eq!(parse_source_decision("DENY"), Ok(Decision::Deny));
        assert!(parse_source_decision("ESCALATE").is_err());
        assert!(parse_source_decision("maybe").is_err());
    }
}
