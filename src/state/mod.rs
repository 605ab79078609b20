//! Nested document storage.
//!
//! The document is a tree of JSON mappings addressed by dotted paths.
//! These functions are pure tree manipulation; notification lives in
//! [`crate::store`].

mod operations;

pub use operations::{diff_sections, lookup, write, Document, SectionDiff, WriteOutcome};
