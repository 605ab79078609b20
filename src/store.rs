//! The observable path store.

use crate::error::{Result, StoreError};
use crate::state::{self, Document, WriteOutcome};
use crate::subscriptions::{
    ChannelSubscription, ListenerResult, Paths, SubscriptionId, SubscriptionManager,
    DEFAULT_MAX_DEPTH,
};
use crate::types::{Path, SetOptions, StateChange, SubscribeOptions, Value};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Fail writes through a non-mapping intermediate segment instead of
    /// overwriting it. Default: false.
    pub strict_intermediates: bool,

    /// Max nested notification passes (listeners writing to the store from
    /// inside a notification). Default: 32.
    pub max_notify_depth: usize,

    /// Buffer size for channel subscriptions. Default: 1000.
    pub channel_buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            strict_intermediates: false,
            max_notify_depth: DEFAULT_MAX_DEPTH,
            channel_buffer_size: 1000,
        }
    }
}

/// A nested document addressed by dotted paths, with change notification.
///
/// Provides:
/// - Reads and writes by path (`get`, `set`, `update`)
/// - Prefix subscriptions notified only when a value actually changes
/// - Reset to the document the store was created with
///
/// One store is created per running application and shared by reference
/// (usually an `Arc`) with every component that needs it.
pub struct PathStore {
    config: StoreConfig,

    /// Current document.
    document: RwLock<Document>,

    /// Document the store was created with, used by `reset`.
    initial: Document,

    subscriptions: SubscriptionManager,
}

impl PathStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty store with the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self::from_parts(config, Document::new())
    }

    /// Create a store seeded with `initial`, which must be a mapping.
    pub fn with_initial(initial: Value) -> Result<Self> {
        Self::with_initial_and_config(initial, StoreConfig::default())
    }

    pub fn with_initial_and_config(initial: Value, config: StoreConfig) -> Result<Self> {
        match initial {
            Value::Object(document) => Ok(Self::from_parts(config, document)),
            other => Err(StoreError::invalid_value(
                "initial document",
                format!("expected a mapping, got {}", kind_of(&other)),
            )),
        }
    }

    fn from_parts(config: StoreConfig, initial: Document) -> Self {
        tracing::debug!(sections = initial.len(), "Initializing path store");
        Self {
            subscriptions: SubscriptionManager::with_max_depth(config.max_notify_depth),
            document: RwLock::new(initial.clone()),
            initial,
            config,
        }
    }

    /// Wrap in an `Arc` for sharing between components.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // --- Reads ---

    /// Copy of the whole document.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.document.read().clone())
    }

    /// Value at `path`, or `None` if any segment is absent, an intermediate
    /// is not a mapping, or the path is malformed.
    pub fn get(&self, path: &str) -> Option<Value> {
        let path = Path::parse(path).ok()?;
        self.get_path(&path)
    }

    /// Value at a parsed path.
    pub fn get_path(&self, path: &Path) -> Option<Value> {
        state::lookup(&self.document.read(), path).cloned()
    }

    /// Deserialize the value at `path`.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get(path) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// True if a value (including `null`) is present at `path`.
    pub fn contains(&self, path: &str) -> bool {
        match Path::parse(path) {
            Ok(path) => state::lookup(&self.document.read(), &path).is_some(),
            Err(_) => false,
        }
    }

    // --- Writes ---

    /// Write `value` at `path`.
    ///
    /// Returns true if the document changed. An equal value is a no-op and
    /// notifies no one, silent or not. Malformed paths and (in strict mode)
    /// structural conflicts are logged and reported as `false`.
    pub fn set(&self, path: &str, value: impl Into<Value>, options: SetOptions) -> bool {
        match self.try_set(path, value, options) {
            Ok(changed) => changed,
            Err(e) => {
                tracing::warn!(path, error = %e, "Ignoring state write");
                false
            }
        }
    }

    /// Like [`set`](Self::set), but reports malformed paths and structural
    /// conflicts as errors.
    pub fn try_set(
        &self,
        path: &str,
        value: impl Into<Value>,
        options: SetOptions,
    ) -> Result<bool> {
        let path = Path::parse(path)?;
        let value = value.into();

        let outcome = {
            let mut doc = self.document.write();
            state::write(&mut doc, &path, value.clone(), self.config.strict_intermediates)?
        };

        match outcome {
            WriteOutcome::Unchanged => Ok(false),
            WriteOutcome::Changed { old } => {
                tracing::debug!(path = %path, silent = options.silent, "State changed");
                if !options.silent {
                    self.notify(&path, Some(value), old);
                }
                Ok(true)
            }
        }
    }

    /// Apply several writes, then notify once per changed path.
    ///
    /// All writes land before any listener runs. Notifications follow the
    /// input order; a path given more than once takes its last value and is
    /// notified once, at its first position. A path whose final value equals
    /// its value before the batch is not notified. Entries with malformed
    /// paths or structural conflicts are skipped and logged.
    pub fn update<I, K>(&self, updates: I, options: SetOptions)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        // (path, value before the batch)
        let mut changed: Vec<(Path, Option<Value>)> = Vec::new();

        {
            let mut doc = self.document.write();
            for (raw, value) in updates {
                let raw = raw.as_ref();
                let path = match Path::parse(raw) {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::warn!(path = raw, error = %e, "Skipping batched write");
                        continue;
                    }
                };

                match state::write(&mut doc, &path, value, self.config.strict_intermediates) {
                    Ok(WriteOutcome::Changed { old }) => {
                        if !changed.iter().any(|(seen, _)| *seen == path) {
                            changed.push((path, old));
                        }
                    }
                    Ok(WriteOutcome::Unchanged) => {}
                    Err(e) => {
                        tracing::warn!(path = raw, error = %e, "Skipping batched write");
                    }
                }
            }
        }

        tracing::debug!(changed = changed.len(), silent = options.silent, "Batched update applied");
        if options.silent {
            return;
        }

        for (path, before) in changed {
            let current = self.get_path(&path);
            if current == before {
                continue;
            }
            self.notify(&path, current, before);
        }
    }

    /// Restore a section (top-level or nested path) to its initial value, or
    /// the whole document when `section` is `None`.
    ///
    /// A whole-document reset notifies once per top-level key whose value
    /// changed. Resetting a section with no initial value does nothing.
    pub fn reset(&self, section: Option<&str>) {
        match section {
            Some(section) => {
                let initial = Path::parse(section)
                    .ok()
                    .and_then(|path| state::lookup(&self.initial, &path).cloned());
                match initial {
                    Some(value) => {
                        self.set(section, value, SetOptions::default());
                    }
                    None => {
                        tracing::warn!(section, "No initial value for section, not resetting");
                    }
                }
            }
            None => {
                let previous = {
                    let mut doc = self.document.write();
                    std::mem::replace(&mut *doc, self.initial.clone())
                };

                for diff in state::diff_sections(&previous, &self.initial) {
                    // Keys of a seeded document need not form valid paths.
                    let Ok(path) = Path::parse(&diff.key) else {
                        continue;
                    };
                    self.notify(&path, diff.new, diff.old);
                }
            }
        }
    }

    // --- Subscriptions ---

    /// Subscribe `callback` to one or more path prefixes.
    ///
    /// With `immediate`, the callback runs once per subscribed path, in
    /// order, with the current value (`None` if absent) before this returns.
    pub fn subscribe<F>(
        &self,
        paths: impl Into<Paths>,
        callback: F,
        options: SubscribeOptions,
    ) -> SubscriptionId
    where
        F: Fn(&StateChange) -> ListenerResult + Send + Sync + 'static,
    {
        let paths = paths.into();
        let id = self.subscriptions.subscribe(&paths, Arc::new(callback));
        if options.immediate {
            self.deliver_current(id, &paths);
        }
        id
    }

    /// Subscribe through a bounded channel sized by
    /// [`StoreConfig::channel_buffer_size`].
    pub fn subscribe_channel(
        &self,
        paths: impl Into<Paths>,
        options: SubscribeOptions,
    ) -> ChannelSubscription {
        let paths = paths.into();
        let handle = self
            .subscriptions
            .subscribe_channel(&paths, self.config.channel_buffer_size);
        if options.immediate {
            self.deliver_current(handle.id, &paths);
        }
        handle
    }

    /// Remove a subscription. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(id)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.subscription_count()
    }

    fn deliver_current(&self, id: SubscriptionId, paths: &Paths) {
        for raw in paths.iter() {
            let change = StateChange {
                path: raw.to_string(),
                new_value: self.get(raw),
                old_value: None,
            };
            if !self.subscriptions.send_to(id, &change) {
                break;
            }
        }
    }

    fn notify(&self, path: &Path, new_value: Option<Value>, old_value: Option<Value>) {
        let change = StateChange {
            path: path.to_string(),
            new_value,
            old_value,
        };
        self.subscriptions.dispatch(path, &change);
    }
}

impl Default for PathStore {
    fn default() -> Self {
        Self::new()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
