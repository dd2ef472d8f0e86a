use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ValidationError;

/// A candidate module read from disk.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Absolute path to the module
    pub path: PathBuf,
    pub text: String,
}

impl SourceFile {
    /// Resolves `path` against the current directory and reads it.
    pub fn load(path: &Path) -> Result<Self, ValidationError> {
        let path = absolutize(path);
        if !path.exists() {
            return Err(ValidationError::FileNotFound(path));
        }

        let text = std::fs::read_to_string(&path).map_err(|e| ValidationError::Unreadable {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        debug!(path = %path.display(), bytes = text.len(), "Loaded candidate module");
        Ok(Self { path, text })
    }

    /// Display name handed to the parser for error messages.
    pub fn display_name(&self) -> String {
        self.path.display().to_string()
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.py");
        std::fs::write(&path, "x = 1\n").unwrap();

        let source = SourceFile::load(&path).unwrap();
        assert_eq!(source.text, "x = 1\n");
        assert!(source.path.is_absolute());
    }

    #[test]
    fn test_missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.py");

        let err = SourceFile::load(&path).unwrap_err();
        assert!(matches!(err, ValidationError::FileNotFound(_)));
        assert!(err.to_string().starts_with("File not found: "));
        assert!(err.to_string().ends_with("nope.py"));
    }

    #[test]
    fn test_non_utf8_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.py");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let err = SourceFile::load(&path).unwrap_err();
        assert!(matches!(err, ValidationError::Unreadable { .. }));
    }

    #[test]
    fn test_relative_path_becomes_absolute() {
        assert!(absolutize(Path::new("does/not/exist.py")).is_absolute());
    }
}
