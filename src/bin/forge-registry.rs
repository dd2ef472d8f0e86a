use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use forge_validator::registry::{RegistryError, RegistryStore, ServerEntry};
use forge_validator::Config;

/// Read and update the registry of admitted servers.
#[derive(Parser, Debug)]
#[command(name = "forge-registry", version, about)]
struct Cli {
    /// Path to a TOML configuration file; its `[registry] path` is used
    /// unless `--registry` is given
    #[arg(short, long, env = "FORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Registry file, overriding the configuration
    #[arg(long, env = "FORGE_REGISTRY")]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the registry as JSON
    Read,
    /// Add a server entry given as a JSON object
    Add { entry: String },
    /// Bump the usage counter of a server
    Increment { name: String },
    /// Print `exists` or `not_found`
    Check { name: String },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let store = match cli.registry {
        Some(path) => RegistryStore::new(path),
        None => match Config::load_or_default(cli.config.as_deref()) {
            Ok(config) => RegistryStore::from_config(&config.registry),
            Err(e) => {
                println!("error: failed to load configuration: {e:#}");
                return ExitCode::FAILURE;
            }
        },
    };

    let result = match cli.command {
        Command::Read => {
            match serde_json::to_string_pretty(&store.read()) {
                Ok(json) => println!("{json}"),
                Err(e) => return fail(&RegistryError::from(e)),
            }
            return ExitCode::SUCCESS;
        }
        Command::Check { name } => {
            println!("{}", if store.exists(&name) { "exists" } else { "not_found" });
            return ExitCode::SUCCESS;
        }
        Command::Add { entry } => ServerEntry::from_json(&entry).and_then(|entry| store.add(entry)),
        Command::Increment { name } => store.increment_uses(&name).map(|_| ()),
    };

    match result {
        Ok(()) => {
            println!("ok");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn fail(error: &RegistryError) -> ExitCode {
    println!("error: {error}");
    ExitCode::FAILURE
}
