//! Rejection reasons for a candidate module.
//!
//! Every variant renders the exact message placed in the report's `error`
//! field. Host-side sandbox failures (interpreter missing, scratch dir
//! creation) arrive as `anyhow::Error` and are folded into
//! [`ValidationError::SandboxUnavailable`] so the partial checks survive.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Could not read {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error(transparent)]
    Structural(#[from] Violation),

    #[error("Module import took too long (possible infinite loop)")]
    ImportTimeout,

    #[error("Sandbox unavailable: {0}")]
    SandboxUnavailable(String),

    #[error("Import error: {kind}: {details}")]
    Import { kind: String, details: String },

    #[error("No {0} instance found")]
    MissingCapabilityInstance(String),

    #[error("Multiple {type_name} instances found ({count})")]
    MultipleCapabilityInstances { type_name: String, count: usize },

    #[error("No tools registered (use @{root}.{verb}() decorator)")]
    NoRegisteredTools { root: String, verb: String },

    #[error("Missing if __name__ == '__main__' block")]
    MissingEntryGuard,

    #[error("Missing {root}.{run}() call")]
    MissingRunCall { root: String, run: String },
}

/// A tool declaration that breaks the plugin contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("Tool functions must be async: {}", .0.join(", "))]
    SyncTool(Vec<String>),

    #[error("Tool functions missing docstrings: {}", .0.join(", "))]
    MissingDocstring(Vec<String>),

    /// Entries are rendered as `declaration(parameter)`.
    #[error("Parameters missing type hints: {}", .0.join(", "))]
    MissingTypeHint(Vec<String>),

    #[error("Tool functions must return {expected}: {}", .names.join(", "))]
    WrongReturnType { expected: String, names: Vec<String> },

    /// Offending source lines, ascending.
    #[error(
        "print() in tool functions breaks stdio transport (use file=sys.stderr): {}",
        render_lines(.0)
    )]
    UnredirectedOutput(Vec<usize>),
}

fn render_lines(lines: &[usize]) -> String {
    lines
        .iter()
        .map(|line| format!("line {line}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_tool_message_names_offenders() {
        let err = ValidationError::from(Violation::SyncTool(vec![
            "fetch".to_string(),
            "parse".to_string(),
        ]));
        assert_eq!(err.to_string(), "Tool functions must be async: fetch, parse");
    }

    #[test]
    fn test_unredirected_output_lists_lines() {
        let err = Violation::UnredirectedOutput(vec![42, 57]);
        assert!(err.to_string().ends_with("line 42, line 57"));
    }

    #[test]
    fn test_import_error_format() {
        let err = ValidationError::Import {
            kind: "ModuleNotFoundError".to_string(),
            details: "No module named 'nope'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Import error: ModuleNotFoundError: No module named 'nope'"
        );
    }

    #[test]
    fn test_marker_aware_messages() {
        let err = ValidationError::NoRegisteredTools {
            root: "mcp".to_string(),
            verb: "tool".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No tools registered (use @mcp.tool() decorator)"
        );

        let err = ValidationError::MissingRunCall {
            root: "mcp".to_string(),
            run: "run".to_string(),
        };
        assert_eq!(err.to_string(), "Missing mcp.run() call");
    }

    #[test]
    fn test_sandbox_unavailable_format() {
        let err = ValidationError::SandboxUnavailable("failed to spawn 'python3'".to_string());
        assert_eq!(err.to_string(), "Sandbox unavailable: failed to spawn 'python3'");
    }

    #[test]
    fn test_file_not_found_shows_path() {
        let err = ValidationError::FileNotFound(PathBuf::from("/tmp/missing/server.py"));
        assert_eq!(err.to_string(), "File not found: /tmp/missing/server.py");
    }
}
