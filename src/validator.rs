//! Validation orchestrator.
//!
//! Sequences the pipeline stages, each gating the next:
//!
//! ```text
//! Start → CompileChecked → StructurallyValid → Loaded → Introspected → Accepted
//!   └──────────────┴───────────────┴──────────────┴───────────┴──→ Rejected
//! ```
//!
//! The orchestrator owns no contract rules; it only threads the report
//! builder through the stages and stops at the first error.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::analyzer::StructuralAnalyzer;
use crate::config::Config;
use crate::error::ValidationError;
use crate::introspect::Introspector;
use crate::report::{labels, ReportBuilder, ValidationReport};
use crate::sandbox::{LoadOutcome, LoadedModule, ModuleLoader, PythonSandbox};
use crate::source::SourceFile;
use crate::syntax::parse_module;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    CompileChecked,
    StructurallyValid,
    Loaded,
    Introspected,
    Accepted,
    Rejected,
}

pub struct Validator {
    config: Config,
    loader: Box<dyn ModuleLoader>,
}

impl Validator {
    /// Validator backed by the Python worker sandbox.
    pub fn new(config: Config) -> Self {
        let loader = Box::new(PythonSandbox::new(&config.sandbox, &config.contract));
        Self::with_loader(config, loader)
    }

    pub fn with_loader(config: Config, loader: Box<dyn ModuleLoader>) -> Self {
        Self { config, loader }
    }

    pub fn loader_description(&self) -> String {
        self.loader.description()
    }

    /// Validates one candidate module.
    ///
    /// Every failure, including a sandbox the host cannot start, comes back
    /// as a rejected report carrying the checks passed so far.
    pub async fn validate(&self, path: &Path) -> ValidationReport {
        let mut report = ReportBuilder::new();
        match self.run(path, &mut report).await {
            Ok(()) => {
                let result = report.accept();
                info!(path = %path.display(), checks = result.checks.len(), "Candidate accepted");
                result
            }
            Err((reached, error)) => {
                info!(reached = ?reached, to = ?Stage::Rejected, error = %error, "Candidate rejected");
                report.reject(&error)
            }
        }
    }

    /// Drives the stages; the error carries the last stage reached.
    async fn run(
        &self,
        path: &Path,
        report: &mut ReportBuilder,
    ) -> std::result::Result<(), (Stage, ValidationError)> {
        let mut stage = Stage::Start;
        macro_rules! advance {
            ($step:expr, $next:expr) => {
                match $step {
                    Ok(value) => {
                        stage = $next;
                        debug!(stage = ?stage, "Stage reached");
                        value
                    }
                    Err(error) => return Err((stage, ValidationError::from(error))),
                }
            };
        }

        let source = advance!(SourceFile::load(path), Stage::Start);

        let tree = advance!(
            parse_module(&source.text, &source.display_name()),
            Stage::CompileChecked
        );
        report.pass(labels::SYNTAX);

        let analyzer = StructuralAnalyzer::new(&self.config.contract);
        advance!(analyzer.analyze(&tree, report), Stage::StructurallyValid);

        let budget: Duration = self.config.sandbox.timeout();
        let outcome = advance!(
            self.loader
                .load(&source.path, budget)
                .await
                .map_err(host_failure),
            Stage::StructurallyValid
        );
        let module = advance!(into_loaded(outcome), Stage::Loaded);
        report.pass(labels::IMPORTS);

        let introspector = Introspector::new(&self.config.contract);
        advance!(
            introspector.inspect(&module, &tree, report),
            Stage::Introspected
        );

        debug!(from = ?stage, stage = ?Stage::Accepted, "Stage reached");
        Ok(())
    }
}

fn host_failure(error: anyhow::Error) -> ValidationError {
    error!("Sandbox could not run: {error:#}");
    ValidationError::SandboxUnavailable(format!("{error:#}"))
}

fn into_loaded(outcome: LoadOutcome) -> std::result::Result<LoadedModule, ValidationError> {
    match outcome {
        LoadOutcome::Loaded(module) => Ok(module),
        LoadOutcome::TimedOut => Err(ValidationError::ImportTimeout),
        LoadOutcome::Failed { kind, message } => Err(ValidationError::Import {
            kind,
            details: message,
        }),
    }
}
