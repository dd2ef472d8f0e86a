//! Structural analysis of candidate modules.
//!
//! Every declaration carrying the capability marker must be:
//!
//! 1. `async` (tools run inside the server's event loop)
//! 2. documented (the docstring becomes the tool description)
//! 3. fully annotated (annotations become the input schema)
//! 4. annotated to return the contract's string type
//! 5. free of console writes that would pollute the stdio transport
//!
//! Checks run in that order and stop at the first violation.

pub mod marker;
pub mod output;

use tracing::debug;

use crate::config::ContractConfig;
use crate::error::Violation;
use crate::report::{labels, ReportBuilder};
use crate::syntax::SyntaxNode;

pub use marker::{CapabilityMarker, ToolDeclaration, TypeRef};
use output::OutputScan;

pub struct StructuralAnalyzer<'c> {
    marker: CapabilityMarker,
    contract: &'c ContractConfig,
}

impl<'c> StructuralAnalyzer<'c> {
    pub fn new(contract: &'c ContractConfig) -> Self {
        Self {
            marker: CapabilityMarker::new(&contract.registry_root, &contract.registration_verb),
            contract,
        }
    }

    pub fn marker(&self) -> &CapabilityMarker {
        &self.marker
    }

    /// Runs all structural checks, appending one label per passed check.
    ///
    /// Returns the number of marked declarations.
    pub fn analyze(
        &self,
        tree: &SyntaxNode,
        report: &mut ReportBuilder,
    ) -> Result<usize, Violation> {
        let tools = self.marker.tools(tree);
        debug!(
            tools = %tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", "),
            "Matched capability declarations"
        );

        check_async(&tools)?;
        report.pass(labels::async_tools(tools.len()));

        check_docstrings(&tools)?;
        report.pass(labels::DOCSTRINGS);

        check_type_hints(&tools)?;
        report.pass(labels::TYPE_HINTS);

        check_return_type(&tools, &self.contract.return_type)?;
        report.pass(labels::RETURN_TYPE);

        let scan = OutputScan {
            diagnostic_streams: &self.contract.diagnostic_streams,
            follow_helpers: self.contract.follow_helpers,
        };
        let lines = scan.violations(tree, &tools);
        if !lines.is_empty() {
            return Err(Violation::UnredirectedOutput(lines));
        }
        report.pass(labels::NO_STDOUT);

        Ok(tools.len())
    }
}

fn offenders(
    tools: &[ToolDeclaration<'_>],
    pred: impl Fn(&ToolDeclaration<'_>) -> bool,
) -> Vec<String> {
    tools
        .iter()
        .filter(|t| pred(t))
        .map(|t| t.name.clone())
        .collect()
}

fn check_async(tools: &[ToolDeclaration<'_>]) -> Result<(), Violation> {
    let sync = offenders(tools, |t| !t.is_async);
    if sync.is_empty() {
        Ok(())
    } else {
        Err(Violation::SyncTool(sync))
    }
}

fn check_docstrings(tools: &[ToolDeclaration<'_>]) -> Result<(), Violation> {
    let undocumented = offenders(tools, |t| !t.has_docstring);
    if undocumented.is_empty() {
        Ok(())
    } else {
        Err(Violation::MissingDocstring(undocumented))
    }
}

fn check_type_hints(tools: &[ToolDeclaration<'_>]) -> Result<(), Violation> {
    let missing: Vec<String> = tools
        .iter()
        .flat_map(|t| {
            t.params
                .iter()
                .filter(|(_, annotated)| !annotated)
                .map(move |(param, _)| format!("{}({param})", t.name))
        })
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Violation::MissingTypeHint(missing))
    }
}

fn check_return_type(tools: &[ToolDeclaration<'_>], expected: &str) -> Result<(), Violation> {
    let wrong = offenders(tools, |t| {
        !matches!(&t.return_annotation, Some(TypeRef::Named(name)) if name == expected)
    });
    if wrong.is_empty() {
        Ok(())
    } else {
        Err(Violation::WrongReturnType {
            expected: expected.to_string(),
            names: wrong,
        })
    }
}
