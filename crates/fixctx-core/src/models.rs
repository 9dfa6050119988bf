//! Shared typed models used across the locator, store, and rewrite layers.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::errors::{FixctxError, FixctxResult};

/// Name given to descriptors synthesized for callee bodies.
pub const PLACEHOLDER_NAME: &str = "PLACEHOLDER";

// ---------------------------------------------------------------------------
// FunctionDescriptor
// ---------------------------------------------------------------------------

/// A function located in a source file.
///
/// Identity is `(filename, start_line)`; `name` and `end_line` are carried for
/// display and slicing only and take no part in equality or hashing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub filename: String,
    pub start_line: i64,
    pub end_line: Option<i64>,
}

impl FunctionDescriptor {
    pub fn new(
        name: impl Into<String>,
        filename: impl Into<String>,
        start_line: i64,
        end_line: Option<i64>,
    ) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            start_line,
            end_line,
        }
    }

    /// Descriptor for a function known only by its location.
    pub fn placeholder(filename: impl Into<String>, start_line: i64) -> Self {
        Self::new(PLACEHOLDER_NAME, filename, start_line, None)
    }

    pub fn location(&self) -> FileLocation {
        FileLocation::new(self.filename.clone(), self.start_line)
    }

    /// Whether `line` falls inside `[start_line, end_line]`.
    pub fn contains_line(&self, line: i64) -> bool {
        match self.end_line {
            Some(end) => self.start_line <= line && line <= end,
            None => self.start_line == line,
        }
    }
}

impl PartialEq for FunctionDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.filename == other.filename && self.start_line == other.start_line
    }
}

impl Eq for FunctionDescriptor {}

impl Hash for FunctionDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.filename.hash(state);
        self.start_line.hash(state);
    }
}

// ---------------------------------------------------------------------------
// FileLocation
// ---------------------------------------------------------------------------

/// Identity of a function folded into an excerpt.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileLocation {
    pub start_line: i64,
    pub filename: String,
}

impl FileLocation {
    pub fn new(filename: impl Into<String>, start_line: i64) -> Self {
        Self {
            start_line,
            filename: filename.into(),
        }
    }

    /// Whether a row's `(relative, absolute, start)` triple starting at
    /// `offset` names this location.
    pub fn matches_row(&self, row: &[String], offset: usize) -> FixctxResult<bool> {
        row_matches(row, offset, &self.filename, self.start_line)
    }
}

impl Ord for FileLocation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.filename
            .cmp(&other.filename)
            .then(self.start_line.cmp(&other.start_line))
    }
}

impl PartialOrd for FileLocation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// QueryRow helpers
// ---------------------------------------------------------------------------

/// One result row of a code database query, columns in select order.
pub type QueryRow = Vec<String>;

/// Number of leading columns every whole-database query selects to attribute
/// a row to its enclosing function.
pub const LOCATION_COLUMNS: usize = 3;

pub fn row_str(row: &[String], idx: usize) -> FixctxResult<&str> {
    row.get(idx).map(String::as_str).ok_or_else(|| {
        FixctxError::Query(format!(
            "row has {} columns, expected at least {}",
            row.len(),
            idx + 1
        ))
    })
}

pub fn row_int(row: &[String], idx: usize) -> FixctxResult<i64> {
    let raw = row_str(row, idx)?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| FixctxError::Query(format!("column {idx} is not an integer: {raw:?}")))
}

/// Match the `(relative path, absolute path, start line)` triple at `offset`
/// against a function identity. Either path may match.
pub fn row_matches(
    row: &[String],
    offset: usize,
    filename: &str,
    start_line: i64,
) -> FixctxResult<bool> {
    let relative = row_str(row, offset)?;
    let absolute = row_str(row, offset + 1)?;
    if relative != filename && absolute != filename {
        return Ok(false);
    }
    Ok(row_int(row, offset + 2)? == start_line)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
