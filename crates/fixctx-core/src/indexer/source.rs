//! Source fetching by line range.
//!
//! All ranges are 1-based and inclusive on both ends: `read_lines(p, 3, 5)`
//! returns lines 3, 4 and 5. An end beyond the last line is clamped; a start
//! beyond it is an error.

use std::path::Path;

use crate::errors::{FixctxError, FixctxResult};
use crate::models::FunctionDescriptor;

/// Slice `[start_line, end_line]` out of already loaded text.
pub fn slice_lines(text: &str, start_line: i64, end_line: i64) -> FixctxResult<Vec<String>> {
    if start_line < 1 || end_line < start_line {
        return Err(FixctxError::Source(format!(
            "invalid line range {start_line}..={end_line}"
        )));
    }
    let lines: Vec<&str> = text.lines().collect();
    let start_idx = (start_line - 1) as usize;
    if start_idx >= lines.len() {
        return Err(FixctxError::Source(format!(
            "line {start_line} is past the end ({} lines)",
            lines.len()
        )));
    }
    let end_idx = (end_line as usize).min(lines.len());
    Ok(lines[start_idx..end_idx]
        .iter()
        .map(|l| l.to_string())
        .collect())
}

/// Read `[start_line, end_line]` of the file at `path`, joined with `\n`.
pub fn read_lines(path: &Path, start_line: i64, end_line: i64) -> FixctxResult<String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| FixctxError::Source(format!("Failed to read {}: {e}", path.display())))?;
    Ok(slice_lines(&content, start_line, end_line)?.join("\n"))
}

/// The seed excerpt of a function: its lines out of the full file text.
pub fn excerpt(file_text: &str, function: &FunctionDescriptor) -> FixctxResult<Vec<String>> {
    let end_line = function.end_line.ok_or_else(|| {
        FixctxError::Source(format!(
            "function {} at {}:{} has no end line",
            function.name, function.filename, function.start_line
        ))
    })?;
    slice_lines(file_text, function.start_line, end_line)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "l1\nl2\nl3\nl4\nl5\n";

    #[test]
    fn test_slice_is_inclusive() {
        assert_eq!(slice_lines(TEXT, 2, 4).unwrap(), vec!["l2", "l3", "l4"]);
        assert_eq!(slice_lines(TEXT, 3, 3).unwrap(), vec!["l3"]);
    }

    #[test]
    fn test_end_past_eof_is_clamped() {
        assert_eq!(slice_lines(TEXT, 4, 99).unwrap(), vec!["l4", "l5"]);
    }

    #[test]
    fn test_bad_ranges_are_errors() {
        assert!(slice_lines(TEXT, 0, 2).is_err());
        assert!(slice_lines(TEXT, 3, 2).is_err());
        assert!(slice_lines(TEXT, 6, 8).is_err());
    }

    #[test]
    fn test_read_lines_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.c");
        std::fs::write(&path, "int f()\r\n{\r\n  return 1;\r\n}\r\n").unwrap();
        assert_eq!(read_lines(&path, 1, 4).unwrap(), "int f()\n{\n  return 1;\n}");
    }

    #[test]
    fn test_read_missing_file_is_source_error() {
        let err = read_lines(Path::new("/nonexistent/x.c"), 1, 2).unwrap_err();
        assert!(matches!(err, FixctxError::Source(_)));
    }

    #[test]
    fn test_excerpt_uses_descriptor_range() {
        let f = FunctionDescriptor::new("f", "a.c", 2, Some(3));
        assert_eq!(excerpt(TEXT, &f).unwrap(), vec!["l2", "l3"]);
        let open = FunctionDescriptor::new("f", "a.c", 2, None);
        assert!(excerpt(TEXT, &open).is_err());
    }
}
