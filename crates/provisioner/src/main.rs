//! hirs-provisioner - collect attestation evidence for one provisioning attempt.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use hirs_provisioner::config::DEFAULT_SETTINGS_FILE;
use hirs_provisioner::Orchestrator;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "hirs-provisioner")]
#[command(
    author,
    version,
    about = "Collect platform attestation evidence for HIRS provisioning"
)]
struct Cli {
    /// Settings file (JSON, or YAML by extension)
    #[arg(long, short, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Write the evidence summary here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    match cli.log_format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    let mut orchestrator = Orchestrator::bootstrap(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    let snapshot = orchestrator.collect();

    let json = serde_json::to_string_pretty(&snapshot.summary())?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("Evidence summary written to {:?}", path);
        }
        None => println!("{}", json),
    }

    Ok(())
}
