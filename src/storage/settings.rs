//! User settings and first-run storage defaults.

use super::KvBackend;
use crate::error::{Result, StoreError};
use crate::todos::TODOS_KEY;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Storage key holding [`Settings`].
pub const SETTINGS_KEY: &str = "settings";

pub const DEFAULT_THEME: &str = "default";

/// Extension-wide preferences. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub theme: String,
    /// Show a notification when an item is added.
    pub notifications: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: DEFAULT_THEME.to_string(),
            notifications: true,
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when none are stored.
    pub fn load(backend: &dyn KvBackend) -> Result<Self> {
        match backend.load(SETTINGS_KEY)? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| StoreError::Deserialization(format!("{SETTINGS_KEY}: {e}"))),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, backend: &dyn KvBackend) -> Result<()> {
        backend.save(SETTINGS_KEY, &serde_json::to_value(self)?)?;
        tracing::debug!(theme = %self.theme, notifications = self.notifications, "Saved settings");
        Ok(())
    }
}

/// Seed an empty to-do list and default settings for any key not yet
/// present. Returns whether anything was written.
pub fn initialize_storage(backend: &dyn KvBackend) -> Result<bool> {
    let mut initialized = false;

    if backend.load(TODOS_KEY)?.is_none() {
        backend.save(TODOS_KEY, &json!([]))?;
        initialized = true;
    }
    if backend.load(SETTINGS_KEY)?.is_none() {
        Settings::default().save(backend)?;
        initialized = true;
    }

    if initialized {
        tracing::debug!("Initialized storage defaults");
    }
    Ok(initialized)
}
