//! Subcommand implementations.
//!
//! Each module exposes `run`, which returns one of [`exit_codes`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use inception_core::AttestorIdentity;

pub mod audit;
pub mod blend;
pub mod keygen;
pub mod simulate;

/// Process exit codes shared by every subcommand.
pub mod exit_codes {
    /// Success exit code.
    pub const SUCCESS: u8 = 0;
    /// Operational error (I/O, parse, missing bundles, bad arguments).
    pub const ERROR: u8 = 1;
    /// A bundle failed its audit.
    pub const AUDIT_FAILED: u8 = 2;
}

/// Prints `error` with its cause chain and maps it to [`exit_codes::ERROR`].
pub fn report_error(command: &str, error: &anyhow::Error) -> u8 {
    tracing::error!(command, error = %format!("{error:#}"), "command failed");
    eprintln!("error: {error:#}");
    exit_codes::ERROR
}

/// Loads trusted identities from `flags`, falling back to `configured`.
pub fn load_trusted(flags: &[PathBuf], configured: &[PathBuf]) -> Result<Vec<AttestorIdentity>> {
    let paths = if flags.is_empty() { configured } else { flags };
    if paths.is_empty() {
        bail!("no trusted identities: pass --trusted or set attestor.trusted in the config");
    }
    paths
        .iter()
        .map(|path| {
            AttestorIdentity::load(path)
                .with_context(|| format!("failed to load trusted identity {}", path.display()))
        })
        .collect()
}

/// Prints `value` as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to encode JSON output")?;
    println!("{text}");
    Ok(())
}

/// Creates `path`'s parent directory if it has one.
pub fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display())),
        _ => Ok(()),
    }
}
