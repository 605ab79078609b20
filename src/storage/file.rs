//! JSON file backend: one `<key>.json` file per key in a directory.

use super::{validate_key, KvBackend};
use crate::error::{Result, StoreError};
use crate::types::Value;
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";

/// Directory-backed key-value storage.
///
/// The directory is locked for exclusive use while the backend is open.
pub struct JsonFileBackend {
    dir: PathBuf,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// Serializes writers within this process.
    write_lock: Mutex<()>,
}

impl JsonFileBackend {
    /// Open (creating if needed) the storage directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let lock_file = Self::acquire_lock(&dir)?;
        tracing::debug!(dir = %dir.display(), "Opened JSON file storage");

        Ok(Self {
            dir,
            _lock_file: lock_file,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keys currently stored, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_key(stem).is_ok() {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.{EXTENSION}")))
    }

    fn acquire_lock(dir: &Path) -> Result<File> {
        let lock_file = File::create(dir.join("LOCK"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        Ok(lock_file)
    }
}

impl KvBackend for JsonFileBackend {
    fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.key_path(key)?;
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)?;
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Deserialization(format!("{key}: {e}")))?;
        Ok(Some(value))
    }

    fn save(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.key_path(key)?;
        let bytes = serde_json::to_vec_pretty(value)?;

        let _lock = self.write_lock.lock();

        // Write to a sibling temp file, then rename over the target.
        let tmp_path = path.with_extension(format!("{EXTENSION}.tmp"));
        let mut file = File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, &path)?;

        tracing::debug!(key, bytes = bytes.len(), "Saved key");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let path = self.key_path(key)?;
        let _lock = self.write_lock.lock();

        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<()> {
        let keys = self.keys()?;
        let _lock = self.write_lock.lock();

        for key in keys {
            fs::remove_file(self.dir.join(format!("{key}.{EXTENSION}")))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for JsonFileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFileBackend").field("dir", &self.dir).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_roundtrip_across_reopen() {
        let dir = TempDir::new().unwrap();

        {
            let backend = JsonFileBackend::open(dir.path()).unwrap();
            backend
                .save("todos", &json!([{"id": 1, "text": "buy milk"}]))
                .unwrap();
        }

        let backend = JsonFileBackend::open(dir.path()).unwrap();
        assert_eq!(
            backend.load("todos").unwrap(),
            Some(json!([{"id": 1, "text": "buy milk"}]))
        );
        assert_eq!(backend.keys().unwrap(), vec!["todos".to_string()]);
    }

    #[test]
    fn test_missing_key() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::open(dir.path()).unwrap();
        assert_eq!(backend.load("settings").unwrap(), None);
        assert!(!backend.remove("settings").unwrap());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::open(dir.path()).unwrap();
        fs::write(dir.path().join("todos.json"), b"{not json").unwrap();

        assert!(matches!(
            backend.load("todos"),
            Err(StoreError::Deserialization(_))
        ));
    }

    #[test]
    fn test_clear_keeps_lock() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::open(dir.path()).unwrap();
        backend.save("a", &json!(1)).unwrap();
        backend.save("b", &json!(2)).unwrap();

        backend.clear().unwrap();
        assert!(backend.keys().unwrap().is_empty());
        assert!(dir.path().join("LOCK").exists());
    }

    #[test]
    fn test_second_open_is_locked() {
        let dir = TempDir::new().unwrap();
        let _backend = JsonFileBackend::open(dir.path()).unwrap();
        assert!(matches!(
            JsonFileBackend::open(dir.path()),
            Err(StoreError::Locked)
        ));
    }

    #[test]
    fn test_rejects_traversal_key() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::open(dir.path()).unwrap();
        assert!(matches!(
            backend.save("../escape", &json!(1)),
            Err(StoreError::InvalidKey(_))
        ));
    }
}
