//! In-memory backend.

use super::{validate_key, KvBackend};
use crate::error::Result;
use crate::types::Value;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Keeps values in a map. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KvBackend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<()> {
        validate_key(key)?;
        self.entries.write().insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.entries.write().remove(key).is_some())
    }

    fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use serde_json::json;

    #[test]
    fn test_save_load_remove() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.load("settings").unwrap(), None);

        backend.save("settings", &json!({"theme": "dark"})).unwrap();
        assert_eq!(backend.load("settings").unwrap(), Some(json!({"theme": "dark"})));
        assert_eq!(backend.len(), 1);

        assert!(backend.remove("settings").unwrap());
        assert!(!backend.remove("settings").unwrap());
        assert!(backend.is_empty());
    }

    #[test]
    fn test_clear() {
        let backend = MemoryBackend::new();
        backend.save("a", &json!(1)).unwrap();
        backend.save("b", &json!(2)).unwrap();
        backend.clear().unwrap();
        assert!(backend.is_empty());
    }

    #[test]
    fn test_rejects_bad_key() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.save("a/b", &json!(1)),
            Err(StoreError::InvalidKey(_))
        ));
    }
}
