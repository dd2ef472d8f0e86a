use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub contract: ContractConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// The plugin contract a candidate module must satisfy.
///
/// The capability marker is `@{registry_root}.{registration_verb}()`;
/// neither half is hardcoded so other naming conventions can be validated.
#[derive(Debug, Deserialize, Clone)]
pub struct ContractConfig {
    /// Name of the module-level registry binding, e.g. `mcp`
    #[serde(default = "default_registry_root")]
    pub registry_root: String,
    /// Member used as the registration decorator, e.g. `tool`
    #[serde(default = "default_registration_verb")]
    pub registration_verb: String,
    /// Type name of the capability registry, e.g. `FastMCP`
    #[serde(default = "default_registry_type")]
    pub registry_type: String,
    /// Dotted module the registry type is imported from
    #[serde(default = "default_registry_module")]
    pub registry_module: String,
    /// Method the entry guard must call on the registry
    #[serde(default = "default_run_method")]
    pub run_method: String,
    /// Required return annotation of every tool
    #[serde(default = "default_return_type")]
    pub return_type: String,
    /// `print(file=...)` targets that do not pollute the stdio transport
    #[serde(default = "default_diagnostic_streams")]
    pub diagnostic_streams: Vec<String>,
    /// Also scan module-level helpers reachable from tool bodies
    #[serde(default = "default_follow_helpers")]
    pub follow_helpers: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SandboxConfig {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default = "default_interpreter_args")]
    pub interpreter_args: Vec<String>,
    /// Wall-clock budget for loading the module
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    /// Supports ${ENV_VAR} substitution
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
}

fn default_registry_root() -> String {
    "mcp".to_string()
}

fn default_registration_verb() -> String {
    "tool".to_string()
}

fn default_registry_type() -> String {
    "FastMCP".to_string()
}

fn default_registry_module() -> String {
    "mcp.server.fastmcp".to_string()
}

fn default_run_method() -> String {
    "run".to_string()
}

fn default_return_type() -> String {
    "str".to_string()
}

fn default_diagnostic_streams() -> Vec<String> {
    vec!["sys.stderr".to_string()]
}

fn default_follow_helpers() -> bool {
    true
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_interpreter_args() -> Vec<String> {
    vec!["-B".to_string()]
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("registry.json")
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            registry_root: default_registry_root(),
            registration_verb: default_registration_verb(),
            registry_type: default_registry_type(),
            registry_module: default_registry_module(),
            run_method: default_run_method(),
            return_type: default_return_type(),
            diagnostic_streams: default_diagnostic_streams(),
            follow_helpers: default_follow_helpers(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            interpreter_args: default_interpreter_args(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

impl SandboxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses TOML after expanding environment variables like ${FORGE_PYTHON}
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let expanded = shellexpand::env(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise falls back to built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
