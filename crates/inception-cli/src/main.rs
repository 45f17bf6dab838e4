//! inception - evidence bundle blending and audit
//!
//! Drives the two producer paths (`simulate`), verifies attestations
//! (`audit`) and reconciles the latest bundle from each path (`blend`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inception_core::config::{DEFAULT_CONFIG_FILE, InceptionConfig};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// inception - evidence bundle blending and audit
#[derive(Parser, Debug)]
#[command(name = "inception")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (optional; defaults apply if absent)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Audit and blend the latest bundle from each producer directory
    Blend(commands::blend::BlendArgs),

    /// Verify a signed bundle file against trusted identities
    Audit(commands::audit::AuditArgs),

    /// Build, attest and store a simulated bundle
    Simulate(commands::simulate::SimulateArgs),

    /// Generate an attestor key pair
    Keygen(commands::keygen::KeygenArgs),
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            // Exit code 2 means a failed audit, so usage errors exit 1.
            let code = if error.use_stderr() {
                commands::exit_codes::ERROR
            } else {
                commands::exit_codes::SUCCESS
            };
            let _ = error.print();
            std::process::exit(i32::from(code));
        },
    };

    // Logs go to stderr so `--json` output on stdout stays parseable.
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = InceptionConfig::load_or_default(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;

    // Commands return precise exit codes (see `commands::exit_codes`), so
    // bypass anyhow's exit-1 handling.
    let exit_code = match &cli.command {
        Commands::Blend(args) => commands::blend::run(args, &config),
        Commands::Audit(args) => commands::audit::run(args, &config),
        Commands::Simulate(args) => commands::simulate::run(args, &config),
        Commands::Keygen(args) => commands::keygen::run(args),
    };
    std::process::exit(i32::from(exit_code));
}
