//! Key-value persistence for document sections.
//!
//! The path store keeps everything in memory. Callers that want state to
//! survive a restart snapshot a section into a [`KvBackend`] and restore it
//! on startup.

mod file;
mod memory;
mod settings;

pub use file::JsonFileBackend;
pub use memory::MemoryBackend;
pub use settings::{initialize_storage, Settings, DEFAULT_THEME, SETTINGS_KEY};

use crate::error::{Result, StoreError};
use crate::store::PathStore;
use crate::types::{SetOptions, Value};
use std::sync::Arc;

/// An opaque key-value map of JSON values.
pub trait KvBackend: Send + Sync {
    /// Load the value stored under `key`.
    fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`, replacing any previous value.
    fn save(&self, key: &str, value: &Value) -> Result<()>;

    /// Remove `key`. Returns whether it existed.
    fn remove(&self, key: &str) -> Result<bool>;

    /// Remove every key.
    fn clear(&self) -> Result<()>;
}

impl<B: KvBackend + ?Sized> KvBackend for Arc<B> {
    fn load(&self, key: &str) -> Result<Option<Value>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &Value) -> Result<()> {
        (**self).save(key, value)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        (**self).remove(key)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

/// Keys are restricted to `[A-Za-z0-9_-]+` so every backend can map them to
/// file names.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// Save the value at `path` under `key`.
///
/// Returns false (and saves nothing) if `path` is absent.
pub fn save_section(
    store: &PathStore,
    backend: &dyn KvBackend,
    key: &str,
    path: &str,
) -> Result<bool> {
    match store.get(path) {
        Some(value) => {
            backend.save(key, &value)?;
            tracing::debug!(key, path, "Saved section");
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Write the value stored under `key` back to `path`, notifying listeners.
///
/// Returns false if nothing was stored under `key` or the stored value is
/// already in place.
pub fn restore_section(
    store: &PathStore,
    backend: &dyn KvBackend,
    key: &str,
    path: &str,
) -> Result<bool> {
    match backend.load(key)? {
        Some(value) => {
            let changed = store.try_set(path, value, SetOptions::default())?;
            tracing::debug!(key, path, changed, "Restored section");
            Ok(changed)
        }
        None => Ok(false),
    }
}
