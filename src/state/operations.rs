//! Document tree operations.

use crate::error::{Result, StoreError};
use crate::types::{Path, Value};
use serde_json::Map;

/// The root of a store document. Always a mapping.
pub type Document = Map<String, Value>;

/// Result of writing a leaf.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOutcome {
    /// The leaf already held an equal value; nothing was touched.
    Unchanged,
    /// The leaf was written. `old` is the previous leaf value, if any.
    Changed { old: Option<Value> },
}

impl WriteOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, WriteOutcome::Changed { .. })
    }
}

/// Walk `path` through nested mappings.
///
/// Returns `None` if any segment is absent or an intermediate node is not a
/// mapping.
pub fn lookup<'a>(doc: &'a Document, path: &Path) -> Option<&'a Value> {
    let (leaf, parents) = path.segments().split_last()?;

    let mut current = doc;
    for segment in parents {
        match current.get(segment) {
            Some(Value::Object(map)) => current = map,
            _ => return None,
        }
    }

    current.get(leaf)
}

/// Write `value` at `path`, creating intermediate mappings as needed.
///
/// An equal leaf short-circuits before any intermediate is created. When
/// `strict` is false an intermediate holding a non-mapping value is replaced
/// by an empty mapping; when true the write fails with
/// [`StoreError::StructuralConflict`] and the document is left untouched.
pub fn write(doc: &mut Document, path: &Path, value: Value, strict: bool) -> Result<WriteOutcome> {
    if lookup(doc, path) == Some(&value) {
        return Ok(WriteOutcome::Unchanged);
    }

    let Some((leaf, parents)) = path.segments().split_last() else {
        return Err(StoreError::InvalidPath(path.to_string()));
    };

    if strict {
        check_intermediates(doc, path, parents)?;
    }

    let mut current = doc;
    for segment in parents {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));

        if !entry.is_object() {
            tracing::warn!(
                path = %path,
                segment = %segment,
                "Overwriting non-mapping intermediate segment"
            );
            *entry = Value::Object(Map::new());
        }

        let Value::Object(next) = entry else {
            unreachable!("intermediate segment was just made a mapping");
        };
        current = next;
    }

    let old = current.insert(leaf.clone(), value);
    Ok(WriteOutcome::Changed { old })
}

fn check_intermediates(doc: &Document, path: &Path, parents: &[String]) -> Result<()> {
    let mut current = doc;
    for segment in parents {
        match current.get(segment) {
            // The rest of the chain will be created fresh.
            None => return Ok(()),
            Some(Value::Object(map)) => current = map,
            Some(_) => {
                return Err(StoreError::StructuralConflict {
                    path: path.to_string(),
                    segment: segment.clone(),
                })
            }
        }
    }
    Ok(())
}

/// One top-level key whose value differs between two documents.
#[derive(Clone, Debug, PartialEq)]
pub struct SectionDiff {
    pub key: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// Compare top-level sections. Keys of `new` come first in their order,
/// followed by keys only present in `old`.
pub fn diff_sections(old: &Document, new: &Document) -> Vec<SectionDiff> {
    let mut diffs = Vec::new();

    for (key, value) in new {
        let previous = old.get(key);
        if previous != Some(value) {
            diffs.push(SectionDiff {
                key: key.clone(),
                old: previous.cloned(),
                new: Some(value.clone()),
            });
        }
    }

    for (key, value) in old {
        if !new.contains_key(key) {
            diffs.push(SectionDiff {
                key: key.clone(),
                old: Some(value.clone()),
                new: None,
            });
        }
    }

    diffs
}
