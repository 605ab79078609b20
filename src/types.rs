//! Core types for the path store.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A document node. Absent nodes are represented as `None` at the API edge,
/// so `Value::Null` is always a present value.
pub type Value = serde_json::Value;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '.';

/// A validated dot-separated path into the document, e.g. `date.selectedDate`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Path {
    raw: String,
    segments: Vec<String>,
}

impl Path {
    /// Parse a dotted path. Empty paths and empty segments (`a..b`, `.a`,
    /// `a.`) are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(StoreError::InvalidPath(raw.to_string()));
        }

        let segments: Vec<String> = raw.split(PATH_SEPARATOR).map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(StoreError::InvalidPath(raw.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments (always at least one).
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The final segment.
    pub fn leaf(&self) -> &str {
        // Non-empty by construction.
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// The enclosing path, or `None` for a top-level path.
    pub fn parent(&self) -> Option<Path> {
        let (_, parents) = self.segments.split_last()?;
        if parents.is_empty() {
            return None;
        }
        Some(Self::from_segments(parents.to_vec()))
    }

    /// Append a segment. Fails if the segment is empty or contains a separator.
    pub fn child(&self, segment: &str) -> Result<Path> {
        if segment.is_empty() || segment.contains(PATH_SEPARATOR) {
            return Err(StoreError::InvalidPath(format!("{}.{}", self.raw, segment)));
        }
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self::from_segments(segments))
    }

    /// True if `self` equals `other` or is a segment-wise ancestor of it.
    ///
    /// `date` matches `date.selectedDate` but not `dateType` or `dateX.foo`.
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        self.segments.len() <= other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| a == b)
    }

    fn from_segments(segments: Vec<String>) -> Self {
        let raw = segments.join(".");
        Self { raw, segments }
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({})", self.raw)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Path {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl TryFrom<&str> for Path {
    type Error = StoreError;

    fn try_from(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl Serialize for Path {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Path::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A change delivered to listeners.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChange {
    /// The path that was written (not the subscribed prefix).
    pub path: String,
    /// Value now at `path`; `None` if absent.
    pub new_value: Option<Value>,
    /// Value before the write; `None` if it was absent or for immediate
    /// deliveries.
    pub old_value: Option<Value>,
}

/// Options for `set` and `update`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SetOptions {
    /// Mutate without notifying listeners.
    pub silent: bool,
}

impl SetOptions {
    pub fn silent() -> Self {
        Self { silent: true }
    }
}

/// Options for `subscribe`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubscribeOptions {
    /// Invoke the callback once per subscribed path with its current value
    /// before `subscribe` returns.
    pub immediate: bool,
}

impl SubscribeOptions {
    pub fn immediate() -> Self {
        Self { immediate: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let path = Path::parse("date.selectedDate").unwrap();
        assert_eq!(path.segments(), &["date".to_string(), "selectedDate".to_string()]);
        assert_eq!(path.leaf(), "selectedDate");
        assert_eq!(path.depth(), 2);
        assert_eq!(path.to_string(), "date.selectedDate");
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        for raw in ["", ".", "a.", ".a", "a..b"] {
            assert!(
                matches!(Path::parse(raw), Err(StoreError::InvalidPath(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_prefix_is_segment_wise() {
        let date = Path::parse("date").unwrap();
        assert!(date.is_prefix_of(&Path::parse("date").unwrap()));
        assert!(date.is_prefix_of(&Path::parse("date.selectedDate").unwrap()));
        assert!(!date.is_prefix_of(&Path::parse("dateType").unwrap()));
        assert!(!date.is_prefix_of(&Path::parse("dateX.foo").unwrap()));

        // Descendants never match their ancestors.
        let deep = Path::parse("date.selectedDate").unwrap();
        assert!(!deep.is_prefix_of(&date));
    }

    #[test]
    fn test_parent_and_child() {
        let path = Path::parse("taskForm.attributes.priority").unwrap();
        let parent = path.parent().unwrap();
        assert_eq!(parent.as_str(), "taskForm.attributes");
        assert_eq!(parent.child("priority").unwrap(), path);
        assert!(Path::parse("top").unwrap().parent().is_none());
        assert!(parent.child("a.b").is_err());
        assert!(parent.child("").is_err());
    }

    #[test]
    fn test_path_serde() {
        let path = Path::parse("repeat.type").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"repeat.type\"");
        let back: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
        assert!(serde_json::from_str::<Path>("\"a..b\"").is_err());
    }
}
