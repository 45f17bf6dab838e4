//! `inception audit`: verify one signed bundle file.
//!
//! # Exit Codes
//!
//! - 0: the bundle passed
//! - 1: the file or a trusted identity could not be read
//! - 2: the bundle failed its audit

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use inception_core::config::InceptionConfig;
use inception_core::evidence::{SignedBundle, audit_with_trusted};
use serde::Serialize;
use tracing::warn;

use super::{exit_codes, load_trusted, print_json, report_error};

/// Arguments for `inception audit`.
#[derive(Debug, Args)]
pub struct AuditArgs {
    /// Signed bundle file
    pub file: PathBuf,

    /// Trusted identity file (repeatable) [default: attestor.trusted]
    #[arg(long)]
    pub trusted: Vec<PathBuf>,

    /// Print a JSON report
    #[arg(long)]
    pub json: bool,
}

/// JSON report for one audited file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuditReport {
    file: String,
    decision_id: String,
    passed: bool,
    signer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Runs the command and returns its exit code.
pub fn run(args: &AuditArgs, config: &InceptionConfig) -> u8 {
    match execute(args, config) {
        Ok(code) => code,
        Err(e) => report_error("audit", &e),
    }
}

fn execute(args: &AuditArgs, config: &InceptionConfig) -> Result<u8> {
    let trusted = load_trusted(&args.trusted, &config.attestor.trusted)?;
    let signed = read_signed_bundle(&args.file)?;

    let outcome = audit_with_trusted(&signed, &trusted);
    let report = AuditReport {
        file: args.file.display().to_string(),
        decision_id: signed.bundle.decision_id.clone(),
        passed: outcome.is_ok(),
        signer: signed.attestation.signer.clone(),
        error: outcome.as_ref().err().map(ToString::to_string),
    };

    if args.json {
        print_json(&report)?;
    } else if let Some(error) = &report.error {
        println!("FAIL {}: {error}", report.file);
    } else {
        println!("PASS {} (signer {})", report.file, report.signer);
    }

    match outcome {
        Ok(_) => Ok(exit_codes::SUCCESS),
        Err(error) => {
            warn!(file = %report.file, %error, "bundle audit failed");
            Ok(exit_codes::AUDIT_FAILED)
        },
    }
}

/// Reads and decodes a signed bundle file.
pub fn read_signed_bundle(path: &std::path::Path) -> Result<SignedBundle> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("{} is not a signed bundle", path.display()))
}
