//! `inception keygen`: create an attestor key pair.
//!
//! Writes the secret key file at `--out` and the public identity beside it
//! as `<stem>.pub.json`. The identity file is what `audit` and `blend`
//! accept through `--trusted`.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use inception_core::Attestor;
use tracing::info;

use super::{ensure_parent, exit_codes, report_error};

/// Arguments for `inception keygen`.
#[derive(Debug, Args)]
pub struct KeygenArgs {
    /// Attestor id recorded in every attestation this key signs
    #[arg(long)]
    pub id: String,

    /// Secret key file to write
    #[arg(long)]
    pub out: PathBuf,

    /// Overwrite an existing key file
    #[arg(long)]
    pub force: bool,
}

/// Runs the command and returns its exit code.
pub fn run(args: &KeygenArgs) -> u8 {
    match execute(args) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => report_error("keygen", &e),
    }
}

fn execute(args: &KeygenArgs) -> Result<()> {
    if args.id.trim().is_empty() {
        bail!("attestor id must not be empty");
    }
    if args.out.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            args.out.display()
        );
    }
    ensure_parent(&args.out)?;

    let attestor = Attestor::generate(args.id.clone());
    let public_path = attestor
        .save(&args.out)
        .with_context(|| format!("failed to write key file {}", args.out.display()))?;

    info!(id = %args.id, key = %args.out.display(), "generated attestor key");
    println!("secret key: {}", args.out.display());
    println!("identity:   {}", public_path.display());
    Ok(())
}
