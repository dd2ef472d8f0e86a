//! Registry of admitted servers, persisted as `registry.json`.
//!
//! Every mutation rewrites the whole file through a temporary sibling and an
//! atomic rename, so readers never observe a half-written registry.
//!
//! Entries are kept as raw JSON objects. Only `name`, `uses` and
//! `created_at` are interpreted, and a field of an unexpected type never
//! makes the rest of the file unreadable.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::RegistryConfig;

/// Timestamp format for `created_at` (UTC, no offset suffix).
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Server '{0}' already exists in registry")]
    Duplicate(String),

    #[error("Server '{0}' not found")]
    NotFound(String),

    #[error("Server entry needs a string \"name\" field")]
    MissingName,

    #[error("Registry {} is not valid JSON, refusing to overwrite it: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("failed to access registry {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One admitted server, stored exactly as it appears in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerEntry(Map<String, Value>);

impl ServerEntry {
    /// Parses an entry given on the command line; it must carry a name.
    pub fn from_json(raw: &str) -> Result<Self, RegistryError> {
        let fields: Map<String, Value> = serde_json::from_str(raw)?;
        let entry = Self(fields);
        if entry.name().is_none() {
            return Err(RegistryError::MissingName);
        }
        Ok(entry)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// Usage counter; anything but a non-negative integer counts as zero.
    pub fn uses(&self) -> u64 {
        self.0.get("uses").and_then(Value::as_u64).unwrap_or(0)
    }

    pub fn created_at(&self) -> Option<&str> {
        self.0.get("created_at").and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    fn tool_count(&self) -> usize {
        self.0
            .get("tools")
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryFile {
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
    /// Top-level fields other than `servers`, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegistryFile {
    pub fn find(&self, name: &str) -> Option<&ServerEntry> {
        self.servers.iter().find(|s| s.name() == Some(name))
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut ServerEntry> {
        self.servers.iter_mut().find(|s| s.name() == Some(name))
    }
}

pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the `[registry] path` of the configuration file.
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(config.path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents for display and lookups. A missing or unparsable
    /// file reads as empty.
    pub fn read(&self) -> RegistryFile {
        match self.load() {
            Ok(file) => file,
            Err(e) => {
                warn!("Registry unreadable, treating as empty: {e}");
                RegistryFile::default()
            }
        }
    }

    /// Appends `entry`, stamping `created_at` and `uses` when absent.
    pub fn add(&self, mut entry: ServerEntry) -> Result<(), RegistryError> {
        let name = entry.name().ok_or(RegistryError::MissingName)?.to_string();
        let mut registry = self.load()?;
        if registry.find(&name).is_some() {
            return Err(RegistryError::Duplicate(name));
        }

        if !entry.0.contains_key("created_at") {
            let now = chrono::Utc::now().format(CREATED_AT_FORMAT).to_string();
            entry.0.insert("created_at".to_string(), Value::from(now));
        }
        if !entry.0.contains_key("uses") {
            entry.0.insert("uses".to_string(), Value::from(0u64));
        }

        info!(server = %name, tools = entry.tool_count(), "Registering server");
        registry.servers.push(entry);
        self.write(&registry)
    }

    pub fn increment_uses(&self, name: &str) -> Result<u64, RegistryError> {
        let mut registry = self.load()?;
        let server = registry
            .find_mut(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        let uses = server.uses() + 1;
        server.0.insert("uses".to_string(), Value::from(uses));
        self.write(&registry)?;
        Ok(uses)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.read().find(name).is_some()
    }

    /// Contents for an update. A missing or blank file is empty; a file
    /// that exists but cannot be interpreted is an error, never overwritten.
    fn load(&self) -> Result<RegistryFile, RegistryError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RegistryFile::default()),
            Err(source) => {
                return Err(RegistryError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(RegistryFile::default());
        }
        serde_json::from_str(&raw).map_err(|e| RegistryError::Unreadable {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn write(&self, registry: &RegistryFile) -> Result<(), RegistryError> {
        let mut content = serde_json::to_string_pretty(registry)?;
        content.push('\n');

        let io_err = |source| RegistryError::Io {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(io_err)?;

        // The temp file is removed on drop if persist never happens.
        let mut tmp = tempfile::Builder::new()
            .prefix(".registry_")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(io_err)?;
        tmp.write_all(content.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> ServerEntry {
        ServerEntry::from_json(
            &serde_json::json!({
                "name": name,
                "description": "Weather lookups",
                "tools": ["get_forecast"],
                "forged_for": "what's the weather",
            })
            .to_string(),
        )
        .unwrap()
    }

    fn file_value(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    // ── read ─────────────────────────────────────────────

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path().join("registry.json"));
        assert!(store.read().servers.is_empty());
        assert!(!store.exists("anything"));
    }

    #[test]
    fn test_corrupt_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(RegistryStore::new(&path).read(), RegistryFile::default());
    }

    #[test]
    fn test_oddly_typed_fields_do_not_hide_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(
            &path,
            r#"{"servers": [
                {"name": "legacy", "description": null, "tools": ["a"], "uses": 2},
                {"name": "odd", "tools": null, "uses": "many"},
                {"name": "neg", "uses": -1}
            ]}"#,
        )
        .unwrap();
        let store = RegistryStore::new(&path);

        assert!(store.exists("legacy"));
        assert!(store.exists("odd"));
        assert_eq!(store.read().find("legacy").unwrap().uses(), 2);
        assert_eq!(store.read().find("odd").unwrap().uses(), 0);
    }

    // ── add ──────────────────────────────────────────────

    #[test]
    fn test_add_stamps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path().join("registry.json"));
        store.add(entry("weather")).unwrap();

        let registry = store.read();
        assert_eq!(registry.servers.len(), 1);
        let server = &registry.servers[0];
        assert_eq!(server.uses(), 0);
        assert_eq!(server.get("uses"), Some(&Value::from(0)));
        let created = server.created_at().unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(created, CREATED_AT_FORMAT).is_ok());
    }

    #[test]
    fn test_add_keeps_given_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path().join("registry.json"));
        let given = ServerEntry::from_json(
            r#"{"name": "weather", "created_at": "2024-01-01T00:00:00", "uses": 7}"#,
        )
        .unwrap();
        store.add(given).unwrap();

        let server = store.read().servers[0].clone();
        assert_eq!(server.created_at(), Some("2024-01-01T00:00:00"));
        assert_eq!(server.uses(), 7);
    }

    #[test]
    fn test_add_rejects_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path().join("registry.json"));
        store.add(entry("weather")).unwrap();

        let err = store.add(entry("weather")).unwrap_err();
        assert_eq!(err.to_string(), "Server 'weather' already exists in registry");
        assert_eq!(store.read().servers.len(), 1);
    }

    #[test]
    fn test_entry_without_name_is_rejected() {
        assert!(matches!(
            ServerEntry::from_json(r#"{"description": "anonymous"}"#),
            Err(RegistryError::MissingName)
        ));
        assert!(matches!(
            ServerEntry::from_json("not json"),
            Err(RegistryError::Json(_))
        ));
    }

    #[test]
    fn test_add_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path().join("nested").join("registry.json"));
        store.add(entry("weather")).unwrap();
        assert!(store.exists("weather"));
    }

    #[test]
    fn test_write_is_pretty_with_trailing_newline_and_no_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let store = RegistryStore::new(&path);
        store.add(entry("weather")).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("{\n  \"servers\""));
        assert!(raw.ends_with("}\n"));

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_unknown_fields_survive_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(
            &path,
            r#"{"version": 3, "servers": [{"name": "legacy", "tools": [], "uses": 2, "owner": "ops"}]}"#,
        )
        .unwrap();
        let store = RegistryStore::new(&path);
        store.add(entry("weather")).unwrap();

        let value = file_value(&path);
        assert_eq!(value["version"], 3);
        assert_eq!(value["servers"][0]["owner"], "ops");
        assert_eq!(value["servers"][1]["name"], "weather");
    }

    #[test]
    fn test_null_description_entry_survives_add() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(
            &path,
            r#"{"servers":[{"name":"legacy","description":null,"tools":["a"],"uses":2}]}"#,
        )
        .unwrap();
        let store = RegistryStore::new(&path);
        store.add(entry("weather")).unwrap();

        let value = file_value(&path);
        assert_eq!(value["servers"].as_array().unwrap().len(), 2);
        assert_eq!(value["servers"][0]["name"], "legacy");
        assert!(value["servers"][0]["description"].is_null());
        assert_eq!(value["servers"][0]["uses"], 2);
    }

    #[test]
    fn test_unparsable_file_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, "{\"servers\": [ truncated").unwrap();
        let store = RegistryStore::new(&path);

        assert!(matches!(
            store.add(entry("weather")).unwrap_err(),
            RegistryError::Unreadable { .. }
        ));
        assert!(matches!(
            store.increment_uses("weather").unwrap_err(),
            RegistryError::Unreadable { .. }
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"servers\": [ truncated");
    }

    #[test]
    fn test_blank_file_counts_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, "\n").unwrap();
        let store = RegistryStore::new(&path);
        store.add(entry("weather")).unwrap();
        assert!(store.exists("weather"));
    }

    #[test]
    fn test_store_follows_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("servers.json");
        let config = crate::config::Config::parse(&format!(
            "[registry]\npath = \"{}\"\n",
            path.display()
        ))
        .unwrap();

        let store = RegistryStore::from_config(&config.registry);
        assert_eq!(store.path(), path.as_path());
        store.add(entry("weather")).unwrap();
        assert!(path.exists());
    }

    // ── increment / check ────────────────────────────────

    #[test]
    fn test_increment_uses() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path().join("registry.json"));
        store.add(entry("weather")).unwrap();

        assert_eq!(store.increment_uses("weather").unwrap(), 1);
        assert_eq!(store.increment_uses("weather").unwrap(), 2);
        assert_eq!(store.read().servers[0].uses(), 2);
    }

    #[test]
    fn test_increment_unknown_server() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path().join("registry.json"));
        let err = store.increment_uses("ghost").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
        assert_eq!(err.to_string(), "Server 'ghost' not found");
    }

    #[test]
    fn test_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path().join("registry.json"));
        store.add(entry("weather")).unwrap();
        assert!(store.exists("weather"));
        assert!(!store.exists("news"));
    }
}
