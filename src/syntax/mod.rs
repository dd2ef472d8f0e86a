//! Compile check: parse candidate source as a Python module without
//! evaluating any of it, and lower the result into the structural tree
//! the contract checks run on.

pub mod lower;
pub mod tree;

use rustpython_parser::{ast, Parse};
use tracing::debug;

use crate::error::ValidationError;
use lower::{LineIndex, Lowerer};

pub use tree::{FunctionSig, ImportBinding, LineSpan, NodeKind, Param, SyntaxNode};

/// Parses `source` into the structural tree.
///
/// `source_path` only appears in diagnostics.
pub fn parse_module(source: &str, source_path: &str) -> Result<SyntaxNode, ValidationError> {
    let lines = LineIndex::new(source);
    let suite = ast::Suite::parse(source, source_path).map_err(|e| {
        let line = lines.line_of(e.offset);
        ValidationError::Syntax(format!("{} at line {line}", e.error))
    })?;

    debug!(statements = suite.len(), "Parsed candidate module");
    let total_lines = source.lines().count();
    Ok(Lowerer::new(&lines).module(&suite, total_lines))
}
