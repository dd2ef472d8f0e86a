use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use forge_validator::{Config, ValidationReport, Validator};

/// Validate a generated MCP server module before it is admitted.
///
/// Prints a JSON report on stdout; exits 0 when the module passes.
#[derive(Parser, Debug)]
#[command(name = "forge-validate", version, about)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "FORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Python module to validate
    path: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Logs go to stderr; stdout carries only the report.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("forge_validator=info")),
        )
        .init();

    let cli = Cli::parse();

    let report = match run(&cli).await {
        Ok(report) => report,
        Err(e) => {
            error!("Configuration could not be loaded: {e:#}");
            ValidationReport {
                ok: false,
                checks: Vec::new(),
                error: Some(format!("{e:#}")),
            }
        }
    };

    println!("{}", report.to_json());
    std::process::exit(report.exit_code());
}

async fn run(cli: &Cli) -> Result<ValidationReport> {
    let config = Config::load_or_default(cli.config.as_deref()).with_context(|| {
        format!(
            "failed to load configuration from {}",
            cli.config
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )
    })?;

    let validator = Validator::new(config);
    info!(
        "Validating {} (sandbox: {})",
        cli.path.display(),
        validator.loader_description()
    );
    Ok(validator.validate(&cli.path).await)
}
