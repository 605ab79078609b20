//! Task-form state shared by the date, time, priority and repeat popups.
//!
//! The popups never reference each other. Each one reads and writes its
//! section of a shared [`PathStore`] and subscribes to the sections it
//! displays. `FormState` holds the schema and the multi-field writes that
//! must land together (date + time + timezone, form reset).

use crate::calendar::DateType;
use crate::error::{Result, StoreError};
use crate::repeat::{CustomRepeat, RepeatData, RepeatKind};
use crate::store::PathStore;
use crate::todos::TaskInput;
use crate::types::{SetOptions, Value};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Highest priority level; levels run 1..=MAX_PRIORITY.
pub const MAX_PRIORITY: u8 = 4;

pub const DEFAULT_TIMEZONE: &str = "floating";

/// Time chosen in the time picker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeData {
    /// `HH:MM`, or `None` for an all-day task.
    pub time: Option<String>,
    pub duration: Option<String>,
    pub timezone: String,
}

impl Default for TimeData {
    fn default() -> Self {
        Self {
            time: None,
            duration: None,
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

/// Views of the popup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum View {
    Main,
    AddTask,
    AddWebsite,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::Main => "main",
            View::AddTask => "addTask",
            View::AddWebsite => "addWebsite",
        }
    }
}

/// Popups whose visibility is tracked under `ui`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Popup {
    DatePicker,
    TimePicker,
    PriorityPopup,
    RepeatDropdown,
}

impl Popup {
    /// Path of the visibility flag, e.g. `ui.datePickerVisible`.
    pub fn visibility_path(&self) -> &'static str {
        match self {
            Popup::DatePicker => "ui.datePickerVisible",
            Popup::TimePicker => "ui.timePickerVisible",
            Popup::PriorityPopup => "ui.priorityPopupVisible",
            Popup::RepeatDropdown => "ui.repeatDropdownVisible",
        }
    }
}

/// Everything the date picker and time picker have selected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeData {
    pub date: Option<NaiveDate>,
    pub date_type: DateType,
    pub time: Option<String>,
    pub duration: Option<String>,
    pub timezone: String,
    pub repeat: RepeatData,
}

/// Toggleable attributes shown on the task form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attributes {
    pub today: bool,
    pub priority: Option<u8>,
    pub reminders: bool,
}

/// Free-text fields of the task form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormData {
    pub text: String,
    pub description: String,
}

/// The complete task form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFormData {
    pub attributes: Attributes,
    pub form_data: FormData,
    #[serde(flatten)]
    pub date_time: DateTimeData,
}

impl TaskFormData {
    /// Convert to the input accepted by [`crate::todos::TodoList::add_task`].
    pub fn to_task_input(&self) -> TaskInput {
        let repeat = self.date_time.repeat.kind.as_ref().map(|_| self.date_time.repeat.clone());
        TaskInput {
            text: self.form_data.text.clone(),
            description: self.form_data.description.clone(),
            due_date: self.date_time.date,
            date_type: Some(self.date_time.date_type),
            due_time: self.date_time.time.clone(),
            priority: self.attributes.priority,
            reminders: self.attributes.reminders,
            repeat,
        }
    }
}

pub(crate) fn validate_priority(priority: u8) -> Result<()> {
    if (1..=MAX_PRIORITY).contains(&priority) {
        Ok(())
    } else {
        Err(StoreError::invalid_value(
            "priority",
            format!("{priority} is outside 1..={MAX_PRIORITY}"),
        ))
    }
}

/// Typed access to the task-form sections of a shared store.
#[derive(Clone)]
pub struct FormState {
    store: Arc<PathStore>,
}

impl FormState {
    /// Wrap a store seeded with [`FormState::default_document`].
    pub fn new(store: Arc<PathStore>) -> Self {
        Self { store }
    }

    /// Create a fresh store seeded with the default document.
    pub fn with_defaults(today: NaiveDate) -> Result<Self> {
        let store = PathStore::with_initial(Self::default_document(today))?;
        Ok(Self::new(store.shared()))
    }

    pub fn store(&self) -> &Arc<PathStore> {
        &self.store
    }

    /// The initial form document. `today` seeds the calendar month.
    pub fn default_document(today: NaiveDate) -> Value {
        let current_month = crate::calendar::first_of_month(today);
        json!({
            "date": {
                "selectedDate": null,
                "dateType": DateType::Today,
                "currentMonth": current_month,
            },
            "time": {
                "selectedTime": null,
                "duration": null,
                "timezone": DEFAULT_TIMEZONE,
                "timeOptions": [],
            },
            "repeat": {
                "type": null,
                "interval": 1,
                "endDate": null,
                "customSettings": null,
            },
            "taskForm": {
                "attributes": {
                    "today": true,
                    "priority": null,
                    "reminders": false,
                },
                "formData": {
                    "text": "",
                    "description": "",
                },
            },
            "websiteForm": {
                "url": "",
                "title": "",
                "description": "",
            },
            "ui": {
                "currentView": View::Main,
                "datePickerVisible": false,
                "timePickerVisible": false,
                "priorityPopupVisible": false,
                "repeatDropdownVisible": false,
            },
            "components": {
                "datePickerInitialized": false,
                "timePickerInitialized": false,
                "priorityPopupInitialized": false,
                "repeatDropdownInitialized": false,
            },
        })
    }

    // --- Date and time ---

    /// Record a date pick. Date, date type, the `today` attribute and (when
    /// given) the time fields are written as one batch.
    pub fn set_selected_date(
        &self,
        date: Option<NaiveDate>,
        date_type: DateType,
        time: Option<&TimeData>,
    ) -> Result<()> {
        let mut updates = vec![
            ("date.selectedDate", serde_json::to_value(date)?),
            ("date.dateType", serde_json::to_value(date_type)?),
            ("taskForm.attributes.today", Value::Bool(date.is_some())),
        ];
        if let Some(time) = time {
            updates.extend(time_updates(time));
        }

        self.store.update(updates, SetOptions::default());
        Ok(())
    }

    /// Write time, duration and timezone as one batch.
    pub fn set_time_data(&self, time: &TimeData) {
        self.store.update(time_updates(time), SetOptions::default());
    }

    /// Move the calendar to the month containing `month`.
    pub fn set_current_month(&self, month: NaiveDate) -> Result<bool> {
        let first = crate::calendar::first_of_month(month);
        Ok(self
            .store
            .set("date.currentMonth", serde_json::to_value(first)?, SetOptions::default()))
    }

    pub fn current_month(&self) -> Result<Option<NaiveDate>> {
        self.store.get_as("date.currentMonth")
    }

    pub fn date_time_data(&self) -> Result<DateTimeData> {
        Ok(DateTimeData {
            date: self.store.get_as::<Option<NaiveDate>>("date.selectedDate")?.flatten(),
            date_type: self.store.get_as("date.dateType")?.unwrap_or(DateType::None),
            time: self.store.get_as::<Option<String>>("time.selectedTime")?.flatten(),
            duration: self.store.get_as::<Option<String>>("time.duration")?.flatten(),
            timezone: self
                .store
                .get_as("time.timezone")?
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            repeat: self.repeat_data()?,
        })
    }

    // --- Repeat ---

    /// Replace the whole repeat section.
    pub fn set_repeat_data(&self, repeat: &RepeatData) -> Result<bool> {
        Ok(self
            .store
            .set("repeat", serde_json::to_value(repeat)?, SetOptions::default()))
    }

    /// Set only the repeat type.
    pub fn set_repeat(&self, kind: Option<RepeatKind>) -> Result<bool> {
        Ok(self
            .store
            .set("repeat.type", serde_json::to_value(kind)?, SetOptions::default()))
    }

    /// Pick a custom repeat from the custom repeat popup.
    pub fn set_custom_repeat(&self, settings: CustomRepeat) -> Result<bool> {
        self.set_repeat_data(&RepeatData::custom(settings))
    }

    /// Current repeat type; anything unreadable counts as none.
    pub fn repeat(&self) -> Option<RepeatKind> {
        self.store
            .get_as::<Option<RepeatKind>>("repeat.type")
            .ok()
            .flatten()
            .flatten()
    }

    /// Label for the repeat attribute, e.g. `Monthly` or `Every 2 weeks`.
    pub fn repeat_label(&self) -> Result<Option<String>> {
        Ok(self.repeat_data()?.label())
    }

    pub fn repeat_data(&self) -> Result<RepeatData> {
        Ok(self.store.get_as("repeat")?.unwrap_or_default())
    }

    // --- Attributes ---

    /// Set the priority level (1..=4) or clear it.
    pub fn set_priority(&self, priority: Option<u8>) -> Result<bool> {
        if let Some(level) = priority {
            validate_priority(level)?;
        }
        Ok(self
            .store
            .set("taskForm.attributes.priority", priority, SetOptions::default()))
    }

    /// Current priority; anything unreadable counts as none.
    pub fn priority(&self) -> Option<u8> {
        match self.store.get_as::<Option<u8>>("taskForm.attributes.priority") {
            Ok(priority) => priority.flatten(),
            Err(e) => {
                tracing::error!(error = %e, "Error reading priority from state");
                None
            }
        }
    }

    /// Set reminders to `enabled`, or flip it when `None`. Returns the new state.
    pub fn toggle_reminders(&self, enabled: Option<bool>) -> bool {
        let current = self
            .store
            .get("taskForm.attributes.reminders")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let next = enabled.unwrap_or(!current);
        self.store
            .set("taskForm.attributes.reminders", next, SetOptions::default());
        next
    }

    // --- UI ---

    pub fn set_current_view(&self, view: View) -> bool {
        self.store.set("ui.currentView", view.as_str(), SetOptions::default())
    }

    pub fn current_view(&self) -> Option<View> {
        self.store.get_as::<View>("ui.currentView").ok().flatten()
    }

    pub fn set_component_visibility(&self, popup: Popup, visible: bool) -> bool {
        self.store
            .set(popup.visibility_path(), visible, SetOptions::default())
    }

    // --- Whole form ---

    pub fn task_form_data(&self) -> Result<TaskFormData> {
        Ok(TaskFormData {
            attributes: self.store.get_as("taskForm.attributes")?.unwrap_or_default(),
            form_data: self.store.get_as("taskForm.formData")?.unwrap_or_default(),
            date_time: self.date_time_data()?,
        })
    }

    /// Return every form field to its default in one batch.
    pub fn reset_form(&self) {
        let updates = vec![
            ("date.selectedDate", Value::Null),
            ("date.dateType", json!(DateType::Today)),
            ("time.selectedTime", Value::Null),
            ("time.duration", Value::Null),
            ("time.timezone", json!(DEFAULT_TIMEZONE)),
            ("repeat.type", Value::Null),
            ("repeat.interval", json!(1)),
            ("repeat.endDate", Value::Null),
            ("repeat.customSettings", Value::Null),
            ("taskForm.attributes.priority", Value::Null),
            ("taskForm.attributes.reminders", json!(false)),
            ("taskForm.attributes.today", json!(true)),
            ("taskForm.formData.text", json!("")),
            ("taskForm.formData.description", json!("")),
        ];
        self.store.update(updates, SetOptions::default());
    }
}

fn time_updates(time: &TimeData) -> Vec<(&'static str, Value)> {
    vec![
        ("time.selectedTime", json!(time.time)),
        ("time.duration", json!(time.duration)),
        ("time.timezone", json!(time.timezone)),
    ]
}
