//! Persisted list of texts confirmed as not violating
//!
//! The file is the only state: every lookup re-reads it so edits made by
//! another process show up on the next message.

use crate::domain::violations::{ModerationError, ModerationResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const STORE_NAME: &str = "non-violations";

/// Ordered set of cleared raw strings backed by a JSON array file
#[derive(Debug, Clone)]
pub struct NonViolationStore {
    path: PathBuf,
}

impl NonViolationStore {
    /// Store backed by `path`; the file need not exist yet
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Current entries in insertion order. An absent file is an empty store.
    pub fn entries(&self) -> ModerationResult<Vec<String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ModerationError::store(
                    STORE_NAME,
                    format!("Failed to read {}: {}", self.path.display(), e),
                ))
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            ModerationError::store(
                STORE_NAME,
                format!("Failed to parse {}: {}", self.path.display(), e),
            )
        })
    }

    /// Whether `text` was cleared before (exact match)
    pub fn contains(&self, text: &str) -> ModerationResult<bool> {
        Ok(self.entries()?.iter().any(|entry| entry == text))
    }

    /// Record `text` as cleared. Returns false when it was already present.
    pub fn learn(&self, text: &str) -> ModerationResult<bool> {
        let mut entries = self.entries()?;
        if entries.iter().any(|entry| entry == text) {
            tracing::debug!("'{}' is already a known non-violation", text);
            return Ok(false);
        }

        entries.push(text.to_string());
        self.write(&entries)?;
        tracing::info!("Learned non-violation: {}", text);
        Ok(true)
    }

    fn write(&self, entries: &[String]) -> ModerationResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| ModerationError::store(STORE_NAME, format!("Failed to serialize: {e}")))?;

        fs::write(&self.path, content).map_err(|e| {
            ModerationError::store(
                STORE_NAME,
                format!("Failed to write {}: {}", self.path.display(), e),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_absent_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = NonViolationStore::new(temp_dir.path().join("non_vio_words.json"));

        assert!(store.entries().unwrap().is_empty());
        assert!(!store.contains("hello").unwrap());
    }

    #[test]
    fn test_learn_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = NonViolationStore::new(temp_dir.path().join("non_vio_words.json"));

        assert!(store.learn("hello").unwrap());
        assert!(!store.learn("hello").unwrap());
        assert!(store.learn("Hello").unwrap());

        assert_eq!(store.entries().unwrap(), vec!["hello", "Hello"]);
        assert!(store.contains("hello").unwrap());
        assert!(!store.contains("hello ").unwrap());
    }

    #[test]
    fn test_external_edits_are_seen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("non_vio_words.json");
        let store = NonViolationStore::new(&path);

        store.learn("first").unwrap();
        fs::write(&path, r#"["edited elsewhere"]"#).unwrap();

        assert!(!store.contains("first").unwrap());
        assert!(store.contains("edited elsewhere").unwrap());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("non_vio_words.json");
        fs::write(&path, "{broken").unwrap();

        let store = NonViolationStore::new(&path);
        assert!(matches!(store.contains("x"), Err(ModerationError::Store { .. })));
        assert!(store.learn("x").is_err());
    }
}
