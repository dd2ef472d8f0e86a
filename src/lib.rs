//! Trust gate for generated MCP server modules.
//!
//! A candidate Python module is parsed, checked structurally against the
//! plugin contract, loaded once in a sandboxed worker, and introspected for
//! the tools it registered. The outcome is a [`ValidationReport`].

pub mod analyzer;
pub mod config;
pub mod error;
pub mod introspect;
pub mod registry;
pub mod report;
pub mod sandbox;
pub mod source;
pub mod syntax;
pub mod validator;

pub use config::Config;
pub use error::{ValidationError, Violation};
pub use report::ValidationReport;
pub use validator::Validator;
