//! Python worker process backend.
//!
//! Each load gets a private scratch directory holding the harness script
//! and the report it writes. Both the worker and the directory are owned
//! by the `load` call: the child is spawned with `kill_on_drop`, so every
//! exit path (normal return, error, or the deadline dropping the wait
//! future) reclaims it, and the directory is removed when `scratch` drops.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{CapabilityRegistry, LoadOutcome, LoadedModule, ModuleLoader};
use crate::config::{ContractConfig, SandboxConfig};

/// The harness script, embedded at compile time.
pub const HARNESS_SCRIPT: &str = include_str!("harness.py");

/// Longest stderr excerpt carried into a failure message.
const STDERR_EXCERPT: usize = 400;

/// What the harness writes to its report file.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum HarnessReport {
    Loaded {
        registries: Vec<CapabilityRegistry>,
    },
    Error {
        kind: String,
        message: String,
    },
}

pub struct PythonSandbox {
    interpreter: String,
    interpreter_args: Vec<String>,
    registry_module: String,
    registry_type: String,
    verb: String,
    run_method: String,
}

impl PythonSandbox {
    pub fn new(sandbox: &SandboxConfig, contract: &ContractConfig) -> Self {
        Self {
            interpreter: sandbox.interpreter.clone(),
            interpreter_args: sandbox.interpreter_args.clone(),
            registry_module: contract.registry_module.clone(),
            registry_type: contract.registry_type.clone(),
            verb: contract.registration_verb.clone(),
            run_method: contract.run_method.clone(),
        }
    }

    fn settings(&self, module: &Path) -> String {
        json!({
            "candidate": module.display().to_string(),
            "registry_module": self.registry_module,
            "registry_type": self.registry_type,
            "verb": self.verb,
            "run_method": self.run_method,
        })
        .to_string()
    }
}

#[async_trait]
impl ModuleLoader for PythonSandbox {
    async fn load(&self, module: &Path, budget: Duration) -> Result<LoadOutcome> {
        let scratch = tempfile::Builder::new()
            .prefix("forge-sandbox-")
            .tempdir()
            .context("failed to create sandbox scratch directory")?;
        let harness = scratch.path().join("harness.py");
        let report_path = scratch.path().join("report.json");
        tokio::fs::write(&harness, HARNESS_SCRIPT)
            .await
            .context("failed to write sandbox harness")?;

        let mut command = Command::new(&self.interpreter);
        command
            .args(&self.interpreter_args)
            .arg(&harness)
            .arg(&report_path)
            .arg(self.settings(module))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = module.parent() {
            command.current_dir(dir);
        }

        debug!(
            interpreter = %self.interpreter,
            module = %module.display(),
            budget_secs = budget.as_secs_f64(),
            "Spawning sandbox worker"
        );
        let started = Instant::now();
        let child = command
            .spawn()
            .with_context(|| format!("failed to spawn sandbox interpreter '{}'", self.interpreter))?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(budget, child.wait_with_output()).await {
            Ok(output) => output.context("failed to wait for sandbox worker")?,
            Err(_) => {
                warn!(
                    module = %module.display(),
                    budget_secs = budget.as_secs_f64(),
                    "Sandbox worker exceeded its budget, killed"
                );
                return Ok(LoadOutcome::TimedOut);
            }
        };

        debug!(
            status = %output.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            stdout_len = output.stdout.len(),
            stderr_len = output.stderr.len(),
            "Sandbox worker exited"
        );

        let raw = match tokio::fs::read_to_string(&report_path).await {
            Ok(raw) => raw,
            Err(_) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Ok(LoadOutcome::Failed {
                    kind: "WorkerExit".to_string(),
                    message: format!(
                        "worker exited with {} without a report: {}",
                        output.status,
                        excerpt(stderr.trim())
                    ),
                });
            }
        };

        let report: HarnessReport =
            serde_json::from_str(&raw).context("sandbox worker wrote a malformed report")?;
        let outcome = match report {
            HarnessReport::Loaded { registries } => {
                info!(
                    module = %module.display(),
                    registries = registries.len(),
                    "Module loaded in sandbox"
                );
                LoadOutcome::Loaded(LoadedModule { registries })
            }
            HarnessReport::Error { kind, message } => {
                info!(module = %module.display(), %kind, "Module raised during load");
                LoadOutcome::Failed { kind, message }
            }
        };
        Ok(outcome)
    }

    fn description(&self) -> String {
        if self.interpreter_args.is_empty() {
            self.interpreter.clone()
        } else {
            format!("{} {}", self.interpreter, self.interpreter_args.join(" "))
        }
    }
}

/// Keeps the tail of `text`, where Python tracebacks put the useful part.
fn excerpt(text: &str) -> String {
    let count = text.chars().count();
    if count <= STDERR_EXCERPT {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - STDERR_EXCERPT).collect();
    format!("...{tail}")
}
