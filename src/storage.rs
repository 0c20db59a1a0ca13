//! Storage layer for taskdeck
//!
//! Every store is a whole document addressed by a workspace-relative key:
//!
//! ```text
//! <workspace>/
//!   .taskdeck.toml              # Optional configuration
//!   .taskdeck/intents.jsonl     # Intent journal
//!   Dashboard/TASKS.md          # Task document
//!   Dashboard/calendar.json     # { "events": [...] }
//!   Dashboard/goals.json        # { "goals": [...] }
//! ```
//!
//! Reads return the full content plus its last-modified time; writes replace
//! the full content. Keys are validated before any filesystem access.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};

/// A whole stored document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    /// Display only; never used to reject writes
    pub last_modified: DateTime<Utc>,
}

/// The key/value contract the synchronizer runs against.
pub trait Store {
    /// Read a document; `Ok(None)` when the key does not exist.
    fn read(&self, key: &str) -> Result<Option<Document>>;

    /// Replace a document, returning its new last-modified time.
    fn write(&self, key: &str, content: &str) -> Result<DateTime<Utc>>;
}

/// Validate a workspace-relative key and return its normalized form.
///
/// Rejects empty keys, NUL bytes, absolute paths and any `..` that would
/// leave the workspace root.
pub fn validate_key(key: &str) -> Result<PathBuf> {
    let reject = |reason: &str| Error::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.trim().is_empty() {
        return Err(reject("key is empty"));
    }
    if key.contains('\0') {
        return Err(reject("key contains a NUL byte"));
    }
    if key.starts_with('/') || key.starts_with('\\') {
        return Err(reject("key must be relative to the workspace"));
    }

    let mut normalized = PathBuf::new();
    for component in Path::new(key).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(reject("key escapes the workspace root"));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(reject("key must be relative to the workspace"));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(reject("key resolves to the workspace root"));
    }

    Ok(normalized)
}

/// File-backed store rooted at a workspace directory
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    root: PathBuf,
    lock_timeout_ms: u64,
}

impl WorkspaceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    /// Path to the workspace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a key, after validation
    pub fn resolve(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_key(key)?))
    }

    /// Whether a key currently exists as a file
    pub fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.resolve(key)?.is_file())
    }
}

impl Store for WorkspaceStore {
    fn read(&self, key: &str) -> Result<Option<Document>> {
        let path = self.resolve(key)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(key, "store key not found");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        let last_modified = modified_at(&path)?;
        tracing::debug!(key, bytes = content.len(), "read store");
        Ok(Some(Document {
            content,
            last_modified,
        }))
    }

    fn write(&self, key: &str, content: &str) -> Result<DateTime<Utc>> {
        let path = self.resolve(key)?;
        lock::write_atomic_locked(&path, content.as_bytes(), self.lock_timeout_ms)?;
        tracing::debug!(key, bytes = content.len(), "wrote store");
        modified_at(&path)
    }
}

fn modified_at(path: &Path) -> Result<DateTime<Utc>> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Utc>::from(modified))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_key_normalizes_relative_paths() {
        assert_eq!(
            validate_key("Dashboard/./TASKS.md").unwrap(),
            PathBuf::from("Dashboard/TASKS.md")
        );
        assert_eq!(
            validate_key("Dashboard/old/../goals.json").unwrap(),
            PathBuf::from("Dashboard/goals.json")
        );
    }

    #[test]
    fn validate_key_rejects_escapes() {
        for key in ["", "   ", "../secrets", "Dashboard/../../x", "/etc/passwd", "a\0b", "."] {
            assert!(
                matches!(validate_key(key), Err(Error::InvalidKey { .. })),
                "expected {key:?} to be rejected"
            );
        }
    }

    #[test]
    fn read_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::new(dir.path());
        assert!(store.read("Dashboard/TASKS.md").unwrap().is_none());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::new(dir.path());

        let written_at = store.write("Dashboard/goals.json", "{\"goals\":[]}").unwrap();
        let doc = store.read("Dashboard/goals.json").unwrap().expect("document");
        assert_eq!(doc.content, "{\"goals\":[]}");
        assert_eq!(doc.last_modified, written_at);
    }

    #[test]
    fn invalid_key_never_touches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::new(dir.path().join("ws"));
        assert!(store.write("../escape.txt", "nope").is_err());
        assert!(!dir.path().join("escape.txt").exists());
        assert!(!dir.path().join("ws").exists());
    }
}
