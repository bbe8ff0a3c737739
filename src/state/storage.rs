//! Local key-value storage
//!
//! Values are strings (JSON documents in practice) stored under fixed keys.
//! The file store keeps every key in one JSON object on disk, read whole and
//! written whole. Writes are not transactional.

use crate::{FirstWordsError, Result};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Persisted string-valued map
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Store backed by a single JSON file
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `<data dir>/firstwords/storage.json`
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("firstwords")
            .join("storage.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(FirstWordsError::Storage(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    FirstWordsError::Storage(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json).map_err(|e| {
            FirstWordsError::Storage(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        // A corrupt file is replaced rather than blocking every future save
        let mut entries = self.read_all().unwrap_or_default();
        entries.insert(key.to_string(), value.to_string());
        debug!("Writing key {} to {}", key, self.path.display());
        self.write_all(&entries)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// In-process store, used when nothing should touch the disk
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("nested").join("storage.json"));

        assert_eq!(store.get("audioConfig").unwrap(), None);
        store.set("audioConfig", "{\"rate\":0.8}").unwrap();
        store.set("level", "2").unwrap();

        let reopened = FileStore::new(store.path().to_path_buf());
        assert_eq!(reopened.get("audioConfig").unwrap().as_deref(), Some("{\"rate\":0.8}"));
        assert_eq!(reopened.get("level").unwrap().as_deref(), Some("2"));

        store.remove("level").unwrap();
        assert_eq!(store.get("level").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "{ not json").unwrap();

        let mut store = FileStore::new(&path);
        assert!(matches!(store.get("audioConfig"), Err(FirstWordsError::Storage(_))));

        // Saving recovers the file
        store.set("audioConfig", "{}").unwrap();
        assert_eq!(store.get("audioConfig").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
