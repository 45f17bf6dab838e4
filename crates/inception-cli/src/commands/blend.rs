//! `inception blend`: reconcile the latest bundle from each producer.
//!
//! Picks the newest `.json` file in the simulation and LLM directories,
//! audits both against the trusted identities (unless `--skip-audit` or
//! `blend.require_audit = false`), blends them and writes
//! `<blended id>.json` into the output directory.
//!
//! # Exit Codes
//!
//! - 0: blended bundle written
//! - 1: I/O or parse failure, or a directory holds no bundle files
//! - 2: an input failed its audit; nothing is written

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use inception_core::config::InceptionConfig;
use inception_core::evidence::{
    BundleFilter, BundleRepository, FsBundleRepository, SignedBundle, blend, load_latest,
    load_latest_audited,
};
use inception_core::{AttestorIdentity, InceptionError};
use tracing::{info, warn};

use super::{exit_codes, load_trusted, print_json, report_error};

/// Arguments for `inception blend`.
#[derive(Debug, Args)]
pub struct BlendArgs {
    /// Simulation bundle directory [default: paths.simulation_dir]
    #[arg(long)]
    pub sim_dir: Option<PathBuf>,

    /// LLM bundle directory [default: paths.llm_dir]
    #[arg(long)]
    pub llm_dir: Option<PathBuf>,

    /// Output directory [default: paths.output_dir]
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Trusted identity file (repeatable) [default: attestor.trusted]
    #[arg(long)]
    pub trusted: Vec<PathBuf>,

    /// Blend without auditing the inputs
    #[arg(long)]
    pub skip_audit: bool,

    /// Print the blended bundle instead of its path
    #[arg(long)]
    pub json: bool,
}

/// Runs the command and returns its exit code.
pub fn run(args: &BlendArgs, config: &InceptionConfig) -> u8 {
    match execute(args, config) {
        Ok(code) => code,
        Err(e) => report_error("blend", &e),
    }
}

fn execute(args: &BlendArgs, config: &InceptionConfig) -> Result<u8> {
    let sim_repo = FsBundleRepository::new(
        args.sim_dir
            .clone()
            .unwrap_or_else(|| config.paths.simulation_dir.clone()),
    );
    let llm_repo = FsBundleRepository::new(
        args.llm_dir
            .clone()
            .unwrap_or_else(|| config.paths.llm_dir.clone()),
    );
    let out_repo = FsBundleRepository::new(
        args.out_dir
            .clone()
            .unwrap_or_else(|| config.paths.output_dir.clone()),
    );

    let trusted = if config.blend.require_audit && !args.skip_audit {
        Some(load_trusted(&args.trusted, &config.attestor.trusted)?)
    } else {
        warn!("blending without auditing the inputs");
        None
    };

    let Some((path_a, a)) = load_input(&sim_repo, trusted.as_deref())? else {
        return Ok(exit_codes::AUDIT_FAILED);
    };
    let Some((path_b, b)) = load_input(&llm_repo, trusted.as_deref())? else {
        return Ok(exit_codes::AUDIT_FAILED);
    };

    let blended = blend(&path_a, &a.bundle, &path_b, &b.bundle);
    let name = format!("{}.json", blended.id);
    out_repo
        .write_json(&name, &blended)
        .with_context(|| format!("failed to write {name}"))?;
    let out_path = out_repo.path_of(&name);

    info!(
        path = %out_path.display(),
        decision = %blended.blended.decision,
        agreement_state = %blended.blended.agreement_state,
        diffs = blended.blended.diffs.len(),
        "wrote blended bundle"
    );

    if args.json {
        print_json(&blended)?;
    } else {
        println!("{}", out_path.display());
    }
    Ok(exit_codes::SUCCESS)
}

/// Loads the newest bundle in `repo`, auditing it when `trusted` is given.
///
/// Returns `None` after reporting an audit failure.
fn load_input(
    repo: &FsBundleRepository,
    trusted: Option<&[AttestorIdentity]>,
) -> Result<Option<(String, SignedBundle)>> {
    let filter = BundleFilter::default();
    let loaded = match trusted {
        Some(trusted) => load_latest_audited(repo, &filter, trusted),
        None => load_latest(repo, &filter).map_err(InceptionError::from),
    };

    match loaded {
        Ok(latest) => {
            let path = repo.path_of(&latest.name).display().to_string();
            if trusted.is_some() {
                info!(
                    path = %path,
                    signer = %latest.signed.attestation.signer,
                    "input bundle passed audit"
                );
            }
            Ok(Some((path, latest.signed)))
        },
        Err(error) if error.is_audit_failure() => {
            let location = repo.location();
            warn!(location = %location, %error, "input bundle failed audit");
            eprintln!("{error} (latest bundle in {location})");
            Ok(None)
        },
        Err(error) => {
            Err(error).with_context(|| format!("failed to load bundle from {}", repo.location()))
        },
    }
}
