//! Sandboxed module loading.
//!
//! A candidate is executed once, in a separate worker process, under a
//! hard wall-clock deadline. The worker replaces the capability registry
//! with a recording stand-in, so introspection reads what the module
//! registered instead of reflecting over arbitrary live objects.
//!
//! Cancellation is ungraceful: a worker that misses its deadline is killed
//! wherever it is. Resources the module itself opened (files, its own child
//! processes) are not tracked.

pub mod python;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

pub use python::PythonSandbox;

/// A tool recorded by the registry stand-in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisteredTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_async: bool,
}

/// One registry instance found among the module's globals.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CapabilityRegistry {
    /// Global name the instance is bound to, e.g. `mcp`
    pub binding: String,
    /// Server name passed to the registry constructor
    #[serde(default)]
    pub server_name: Option<String>,
    /// Tools in registration order
    #[serde(default)]
    pub tools: Vec<RegisteredTool>,
}

impl CapabilityRegistry {
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }
}

/// A module that finished executing its top level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedModule {
    pub registries: Vec<CapabilityRegistry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(LoadedModule),
    /// The deadline fired; the worker was killed.
    TimedOut,
    /// Top-level code raised, or the worker died without reporting.
    Failed { kind: String, message: String },
}

/// Loads a candidate module in isolation.
///
/// `Err` is reserved for host-side defects (interpreter missing, scratch
/// space unavailable); anything the module itself does maps to a
/// [`LoadOutcome`].
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, module: &Path, budget: Duration) -> anyhow::Result<LoadOutcome>;

    /// Human-readable description, e.g. `"python3 -B"`.
    fn description(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time verification that `ModuleLoader` is object-safe.
    #[test]
    fn test_module_loader_is_object_safe() {
        fn _assert_object_safe(_: &dyn ModuleLoader) {}
    }

    #[test]
    fn test_registry_deserializes_with_defaults() {
        let registry: CapabilityRegistry =
            serde_json::from_str(r#"{"binding": "mcp", "tools": [{"name": "a"}]}"#).unwrap();
        assert_eq!(registry.server_name, None);
        assert_eq!(registry.tool_names(), vec!["a"]);
        assert!(!registry.tools[0].is_async);
    }
}
