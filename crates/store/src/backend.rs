//! Durable key/value storage for the serialized widget collection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;

/// Where the serialized collection lives between runs.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// `Ok(None)` when nothing has been stored under `key` yet.
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrite the value under `key`. Must be all-or-nothing.
    async fn save(&self, key: &str, contents: &str) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// JSON file storage
// ---------------------------------------------------------------------------

/// One `<key>.json` file per key inside a directory.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash mid-write leaves the previous contents intact.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl StorageBackend for JsonFileStorage {
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    async fn save(&self, key: &str, contents: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(io_error(&self.dir))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(io_error(&tmp))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(io_error(&path))?;

        tracing::debug!(path = %path.display(), bytes = contents.len(), "Widget collection saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory storage
// ---------------------------------------------------------------------------

/// Process-local storage; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded storage, e.g. with a payload left by an older build.
    pub fn with_entry(key: impl Into<String>, contents: impl Into<String>) -> Self {
        let storage = Self::default();
        storage.put(key.into(), contents.into());
        storage
    }

    /// Current raw value under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn put(&self, key: String, contents: String) {
        self.lock().insert(key, contents);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get(key))
    }

    async fn save(&self, key: &str, contents: &str) -> Result<(), StorageError> {
        self.put(key.to_string(), contents.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn file_storage_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("nested"));

        assert_eq!(storage.load("widgets").await.unwrap(), None);
        storage.save("widgets", "[1]").await.unwrap();
        storage.save("widgets", "[2]").await.unwrap();
        assert_eq!(storage.load("widgets").await.unwrap().as_deref(), Some("[2]"));
        assert!(!dir.path().join("nested/widgets.json.tmp").exists());
    }

    #[tokio::test]
    async fn file_storage_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path());
        assert_matches!(
            storage.save("../escape", "[]").await,
            Err(StorageError::InvalidKey(_))
        );
        assert_matches!(storage.load("").await, Err(StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn memory_storage_round_trips() {
        let storage = MemoryStorage::with_entry("a", "x");
        assert_eq!(storage.load("a").await.unwrap().as_deref(), Some("x"));
        storage.save("a", "y").await.unwrap();
        assert_eq!(storage.get("a").as_deref(), Some("y"));
        assert_eq!(storage.load("b").await.unwrap(), None);
    }
}
