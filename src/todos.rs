//! Tasks and saved websites, persisted as one list in a [`KvBackend`].

use crate::calendar::DateType;
use crate::error::{Result, StoreError};
use crate::repeat::{CustomRepeat, RepeatBasis, RepeatData, RepeatEnds, RepeatKind, RepeatUnit};
use crate::storage::KvBackend;
use crate::types::Value;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Storage key holding the list.
pub const TODOS_KEY: &str = "todos";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoKind {
    /// Records written without a `type` (context-menu captures) are tasks.
    #[default]
    Task,
    Website,
}

/// A stored item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredTodo")]
pub struct Todo {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: TodoKind,
    /// Task text, or the website title.
    pub text: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    /// Where the item was captured, e.g. `context-menu`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_type: Option<DateType>,
    pub due_time: Option<String>,
    pub priority: Option<u8>,
    pub reminders: bool,
    pub repeat: Option<RepeatData>,
}

/// Every record shape found in a `todos` list: the flat form written by
/// [`Todo`], and the older forms with a nested `attributes` object, ISO
/// datetime due dates, reminder lists and dropdown-style repeat values.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTodo {
    id: u64,
    #[serde(rename = "type", default)]
    kind: TodoKind,
    text: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    completed: bool,
    created_at: DateTime<Utc>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default, deserialize_with = "deserialize_due_date")]
    due_date: Option<NaiveDate>,
    #[serde(default)]
    date_type: Option<DateType>,
    #[serde(default)]
    due_time: Option<String>,
    #[serde(default)]
    priority: Option<u8>,
    #[serde(default)]
    reminders: Option<StoredReminders>,
    #[serde(default)]
    repeat: Option<Value>,
    #[serde(default)]
    attributes: Option<StoredAttributes>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredReminders {
    Flag(bool),
    List(Vec<Value>),
}

impl StoredReminders {
    fn enabled(&self) -> bool {
        match self {
            StoredReminders::Flag(flag) => *flag,
            StoredReminders::List(list) => !list.is_empty(),
        }
    }
}

/// `attributes` as the task form kept it. `priority` is a level or a
/// plain "is set" flag depending on the writer.
#[derive(Default, Deserialize)]
#[serde(default)]
struct StoredAttributes {
    priority: Value,
    reminders: Value,
}

/// Custom repeat as the repeat dropdown emits it:
/// `{"type": "custom", "basedOn", "every": {"number", "unit"}, "ends"}`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DropdownCustomRepeat {
    #[serde(default)]
    based_on: RepeatBasis,
    every: DropdownEvery,
    #[serde(default)]
    ends: RepeatEnds,
}

#[derive(Deserialize)]
struct DropdownEvery {
    number: u32,
    unit: RepeatUnit,
}

impl From<StoredTodo> for Todo {
    fn from(record: StoredTodo) -> Self {
        let attributes = record.attributes.unwrap_or_default();
        let priority = record.priority.or_else(|| {
            attributes
                .priority
                .as_u64()
                .and_then(|level| u8::try_from(level).ok())
        });
        let reminders = record.reminders.as_ref().is_some_and(StoredReminders::enabled)
            || attributes.reminders.as_bool().unwrap_or(false);
        let repeat = record.repeat.and_then(|value| repeat_from_record(record.id, value));

        Todo {
            id: record.id,
            kind: record.kind,
            text: record.text,
            description: record.description,
            url: record.url,
            completed: record.completed,
            created_at: record.created_at,
            source: record.source,
            due_date: record.due_date,
            date_type: record.date_type,
            due_time: record.due_time,
            priority,
            reminders,
            repeat,
        }
    }
}

/// Accepts `2025-03-20` or a full ISO datetime, keeping the date part.
fn deserialize_due_date<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(&raw).ok().map(|dt| dt.date_naive()))
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid due date {raw:?}")))
}

fn repeat_from_record(id: u64, value: Value) -> Option<RepeatData> {
    if value.is_null() {
        return None;
    }

    let parsed = match value.get("type").and_then(Value::as_str) {
        Some("preset") => value
            .get("value")
            .cloned()
            .and_then(|kind| serde_json::from_value::<RepeatKind>(kind).ok())
            .map(RepeatData::preset),
        Some("custom") if value.get("every").is_some_and(Value::is_object) => {
            serde_json::from_value::<DropdownCustomRepeat>(value.clone())
                .ok()
                .map(|custom| {
                    RepeatData::custom(CustomRepeat {
                        based_on: custom.based_on,
                        every: custom.every.number.max(1),
                        unit: custom.every.unit,
                        ends: custom.ends,
                    })
                })
        }
        _ => serde_json::from_value::<RepeatData>(value.clone()).ok(),
    };

    if parsed.is_none() {
        tracing::warn!(id, repeat = %value, "Ignoring unreadable repeat settings");
    }
    parsed
}

/// Fields submitted by the task form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskInput {
    pub text: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub date_type: Option<DateType>,
    pub due_time: Option<String>,
    pub priority: Option<u8>,
    pub reminders: bool,
    pub repeat: Option<RepeatData>,
}

/// Fields submitted by the website form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WebsiteInput {
    pub url: String,
    pub title: String,
    pub description: String,
}

/// The to-do list. Every mutation writes the whole list back to the
/// backend; a failed save leaves the in-memory list unchanged.
pub struct TodoList<B: KvBackend> {
    backend: B,
    items: Vec<Todo>,
}

impl<B: KvBackend> TodoList<B> {
    /// Load the list from `backend`. A missing key is an empty list; an
    /// unreadable one is an error.
    pub fn load(backend: B) -> Result<Self> {
        let items = match backend.load(TODOS_KEY)? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| StoreError::Deserialization(format!("{TODOS_KEY}: {e}")))?,
            None => Vec::new(),
        };
        tracing::debug!(count = items.len(), "Loaded todos");
        Ok(Self { backend, items })
    }

    pub fn items(&self) -> &[Todo] {
        &self.items
    }

    /// Items not yet completed, in insertion order.
    pub fn pending(&self) -> impl Iterator<Item = &Todo> {
        self.items.iter().filter(|t| !t.completed)
    }

    pub fn get(&self, id: u64) -> Option<&Todo> {
        self.items.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Add a task. Empty (or whitespace) text is rejected.
    pub fn add_task(&mut self, input: TaskInput) -> Result<&Todo> {
        let text = input.text.trim();
        if text.is_empty() {
            return Err(StoreError::invalid_value("text", "task text is empty"));
        }
        if let Some(priority) = input.priority {
            crate::form::validate_priority(priority)?;
        }

        let now = Utc::now();
        let todo = Todo {
            id: self.next_id(now)?,
            kind: TodoKind::Task,
            text: text.to_string(),
            description: input.description,
            url: None,
            completed: false,
            created_at: now,
            source: None,
            due_date: input.due_date,
            date_type: input.date_type,
            due_time: input.due_time,
            priority: input.priority,
            reminders: input.reminders,
            repeat: input.repeat,
        };
        self.push(todo)
    }

    /// Add a website bookmark. The title falls back to the URL.
    pub fn add_website(&mut self, input: WebsiteInput) -> Result<&Todo> {
        let url = input.url.trim();
        if url.is_empty() {
            return Err(StoreError::invalid_value("url", "website url is empty"));
        }
        let title = match input.title.trim() {
            "" => url,
            title => title,
        };

        let now = Utc::now();
        let todo = Todo {
            id: self.next_id(now)?,
            kind: TodoKind::Website,
            text: title.to_string(),
            description: input.description,
            url: Some(url.to_string()),
            completed: false,
            created_at: now,
            source: None,
            due_date: None,
            date_type: None,
            due_time: None,
            priority: None,
            reminders: false,
            repeat: None,
        };
        self.push(todo)
    }

    /// Flip an item's completed flag. Returns false if no item has `id`.
    pub fn toggle_complete(&mut self, id: u64) -> Result<bool> {
        let Some(index) = self.items.iter().position(|t| t.id == id) else {
            return Ok(false);
        };

        let mut items = self.items.clone();
        items[index].completed = !items[index].completed;
        self.commit(items)?;
        Ok(true)
    }

    /// Delete an item. Returns false if no item has `id`.
    pub fn delete(&mut self, id: u64) -> Result<bool> {
        if self.get(id).is_none() {
            return Ok(false);
        }

        let items = self.items.iter().filter(|t| t.id != id).cloned().collect();
        self.commit(items)?;
        Ok(true)
    }

    /// Remove every item.
    pub fn clear(&mut self) -> Result<()> {
        self.commit(Vec::new())
    }

    fn push(&mut self, todo: Todo) -> Result<&Todo> {
        let mut items = self.items.clone();
        items.push(todo);
        self.commit(items)?;
        // Non-empty: just pushed.
        Ok(&self.items[self.items.len() - 1])
    }

    fn commit(&mut self, items: Vec<Todo>) -> Result<()> {
        let value = serde_json::to_value(&items)?;
        self.backend.save(TODOS_KEY, &value)?;
        tracing::debug!(count = items.len(), "Saved todos");
        self.items = items;
        Ok(())
    }

    /// Millisecond timestamp, bumped past the largest existing id.
    fn next_id(&self, now: DateTime<Utc>) -> Result<u64> {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let Some(max_existing) = self.items.iter().map(|t| t.id).max() else {
            return Ok(millis);
        };
        let next = max_existing.checked_add(1).ok_or_else(|| {
            StoreError::invalid_value("id", "no ids left above the largest stored id")
        })?;
        Ok(millis.max(next))
    }
}
