//! Repeat settings for tasks: presets, custom intervals and their labels.

use crate::error::{Result, StoreError};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// How often a task repeats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatKind {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    /// Every N units, see [`CustomRepeat`].
    Custom,
}

impl RepeatKind {
    /// Options in the order the repeat dropdown lists them.
    pub const ALL: [RepeatKind; 5] = [
        RepeatKind::Daily,
        RepeatKind::Weekly,
        RepeatKind::Monthly,
        RepeatKind::Yearly,
        RepeatKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatKind::Daily => "daily",
            RepeatKind::Weekly => "weekly",
            RepeatKind::Monthly => "monthly",
            RepeatKind::Yearly => "yearly",
            RepeatKind::Custom => "custom",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RepeatKind::Daily => "Daily",
            RepeatKind::Weekly => "Weekly",
            RepeatKind::Monthly => "Monthly",
            RepeatKind::Yearly => "Yearly",
            RepeatKind::Custom => "Custom repeat",
        }
    }

    /// Secondary text shown next to the option for a task starting `today`:
    /// `the 12th` for monthly, `March 12th` for yearly.
    pub fn hint(&self, today: NaiveDate) -> Option<String> {
        match self {
            RepeatKind::Monthly => Some(format!("the {}", ordinal(today.day()))),
            RepeatKind::Yearly => {
                Some(format!("{} {}", today.format("%B"), ordinal(today.day())))
            }
            _ => None,
        }
    }
}

/// Unit of a custom repeat interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatUnit {
    Day,
    Week,
    Month,
    Year,
}

impl RepeatUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatUnit::Day => "day",
            RepeatUnit::Week => "week",
            RepeatUnit::Month => "month",
            RepeatUnit::Year => "year",
        }
    }
}

/// What the next occurrence is counted from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatBasis {
    #[default]
    Scheduled,
    Completed,
}

/// When a custom repeat stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EndsRecord", into = "EndsRecord")]
pub enum RepeatEnds {
    #[default]
    Never,
    OnDate(NaiveDate),
}

impl RepeatEnds {
    pub fn end_date(&self) -> Option<NaiveDate> {
        match self {
            RepeatEnds::Never => None,
            RepeatEnds::OnDate(date) => Some(*date),
        }
    }
}

/// Stored form of [`RepeatEnds`]: `{"option": "never" | "onDate", "date": ...}`.
#[derive(Serialize, Deserialize)]
struct EndsRecord {
    option: String,
    #[serde(default)]
    date: Option<String>,
}

impl TryFrom<EndsRecord> for RepeatEnds {
    type Error = StoreError;

    fn try_from(record: EndsRecord) -> Result<Self> {
        match (record.option.as_str(), record.date) {
            ("never", _) => Ok(RepeatEnds::Never),
            ("onDate", Some(date)) => parse_end_date(&date).map(RepeatEnds::OnDate),
            ("onDate", None) => Err(StoreError::invalid_value("ends.date", "missing end date")),
            (other, _) => Err(StoreError::invalid_value(
                "ends.option",
                format!("unknown option {other:?}"),
            )),
        }
    }
}

impl From<RepeatEnds> for EndsRecord {
    fn from(ends: RepeatEnds) -> Self {
        match ends {
            RepeatEnds::Never => EndsRecord {
                option: "never".to_string(),
                date: None,
            },
            RepeatEnds::OnDate(date) => EndsRecord {
                option: "onDate".to_string(),
                date: Some(date.format("%Y-%m-%d").to_string()),
            },
        }
    }
}

/// ISO dates, plus the `MM/DD/YYYY` form the custom repeat popup displays.
fn parse_end_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .map_err(|e| StoreError::invalid_value("ends.date", format!("{raw:?}: {e}")))
}

/// "Every N units", from the custom repeat popup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRepeat {
    #[serde(default)]
    pub based_on: RepeatBasis,
    pub every: u32,
    pub unit: RepeatUnit,
    #[serde(default)]
    pub ends: RepeatEnds,
}

impl CustomRepeat {
    /// `every` is clamped to at least 1.
    pub fn new(every: u32, unit: RepeatUnit, ends: RepeatEnds) -> Self {
        Self {
            based_on: RepeatBasis::Scheduled,
            every: every.max(1),
            unit,
            ends,
        }
    }

    /// `Every 1 day`, `Every 3 weeks`.
    pub fn label(&self) -> String {
        let plural = if self.every > 1 { "s" } else { "" };
        format!("Every {} {}{}", self.every, self.unit.as_str(), plural)
    }
}

/// The `repeat` section of the form document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatData {
    /// `None` for no repeat.
    #[serde(rename = "type")]
    pub kind: Option<RepeatKind>,
    pub interval: u32,
    pub end_date: Option<NaiveDate>,
    pub custom_settings: Option<CustomRepeat>,
}

impl Default for RepeatData {
    fn default() -> Self {
        Self {
            kind: None,
            interval: 1,
            end_date: None,
            custom_settings: None,
        }
    }
}

impl RepeatData {
    /// A preset repeat.
    pub fn preset(kind: RepeatKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// A custom repeat. Interval and end date mirror the settings.
    pub fn custom(settings: CustomRepeat) -> Self {
        Self {
            kind: Some(RepeatKind::Custom),
            interval: settings.every,
            end_date: settings.ends.end_date(),
            custom_settings: Some(settings),
        }
    }

    pub fn is_set(&self) -> bool {
        self.kind.is_some()
    }

    /// Text for the repeat attribute on the task form, `None` when unset.
    pub fn label(&self) -> Option<String> {
        match (self.kind?, &self.custom_settings) {
            (RepeatKind::Custom, Some(custom)) => Some(custom.label()),
            (kind, _) => Some(kind.label().to_string()),
        }
    }
}

/// `st`, `nd`, `rd` or `th`. 11, 12 and 13 (and 111, ...) take `th`.
pub fn ordinal_suffix(n: u32) -> &'static str {
    if (n / 10) % 10 == 1 {
        return "th";
    }
    match n % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// `1st`, `12th`, `22nd`.
pub fn ordinal(n: u32) -> String {
    format!("{n}{}", ordinal_suffix(n))
}
