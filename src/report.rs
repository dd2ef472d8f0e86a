//! The validation report and the builder that enforces its invariant:
//! checks accumulate only until the first failure, which freezes the report.

use serde::Serialize;

use crate::error::ValidationError;

/// Result of running the pipeline on one candidate module.
///
/// Serialized with keys in declaration order: `ok`, `checks`, `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub checks: Vec<String>,
    pub error: Option<String>,
}

impl ValidationReport {
    /// Pretty JSON document as printed by `forge-validate`.
    pub fn to_json(&self) -> String {
        // Serializing plain strings and bools cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn exit_code(&self) -> i32 {
        if self.ok {
            0
        } else {
            1
        }
    }
}

/// Accumulates passed check labels.
///
/// `reject` consumes the builder, so nothing can be appended after a failure.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    checks: Vec<String>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pass(&mut self, label: impl Into<String>) {
        self.checks.push(label.into());
    }

    pub fn checks(&self) -> &[String] {
        &self.checks
    }

    pub fn reject(self, error: &ValidationError) -> ValidationReport {
        ValidationReport {
            ok: false,
            checks: self.checks,
            error: Some(error.to_string()),
        }
    }

    pub fn accept(self) -> ValidationReport {
        ValidationReport {
            ok: true,
            checks: self.checks,
            error: None,
        }
    }
}

// ── Check labels ─────────────────────────────────────────

pub mod labels {
    pub const SYNTAX: &str = "syntax: PASS";
    pub const DOCSTRINGS: &str = "docstrings: PASS";
    pub const TYPE_HINTS: &str = "type_hints: PASS";
    pub const RETURN_TYPE: &str = "return_type: PASS";
    pub const NO_STDOUT: &str = "no_stdout_in_tools: PASS";
    pub const IMPORTS: &str = "imports: PASS";
    pub const MAIN_BLOCK: &str = "main_block: PASS";

    pub fn async_tools(count: usize) -> String {
        format!("async_tools: PASS ({count} tools)")
    }

    pub fn registry_instance(type_name: &str) -> String {
        format!("{}_instance: PASS", type_name.to_lowercase())
    }

    pub fn tools_registered(names: &[String]) -> String {
        format!("tools_registered: PASS ({})", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_keeps_checks_in_order() {
        let mut builder = ReportBuilder::new();
        builder.pass(labels::SYNTAX);
        builder.pass(labels::async_tools(2));
        let report = builder.accept();

        assert!(report.ok);
        assert_eq!(report.checks, vec!["syntax: PASS", "async_tools: PASS (2 tools)"]);
        assert!(report.error.is_none());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_reject_carries_partial_checks_and_one_error() {
        let mut builder = ReportBuilder::new();
        builder.pass(labels::SYNTAX);
        let report = builder.reject(&ValidationError::MissingEntryGuard);

        assert!(!report.ok);
        assert_eq!(report.checks, vec!["syntax: PASS"]);
        assert_eq!(
            report.error.as_deref(),
            Some("Missing if __name__ == '__main__' block")
        );
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_json_key_order() {
        let report = ReportBuilder::new().reject(&ValidationError::ImportTimeout);
        let json = report.to_json();
        let ok = json.find("\"ok\"").unwrap();
        let checks = json.find("\"checks\"").unwrap();
        let error = json.find("\"error\"").unwrap();
        assert!(ok < checks && checks < error);
    }

    #[test]
    fn test_accepted_report_serializes_null_error() {
        let report = ReportBuilder::new().accept();
        let value: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert!(value["error"].is_null());
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_registry_instance_label() {
        assert_eq!(labels::registry_instance("FastMCP"), "fastmcp_instance: PASS");
        assert_eq!(
            labels::tools_registered(&["a".to_string(), "b".to_string()]),
            "tools_registered: PASS (a, b)"
        );
    }
}
