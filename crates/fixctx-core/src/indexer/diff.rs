//! Map a fix commit's file diff onto the functions it touches.

use std::collections::BTreeSet;

use similar::{ChangeTag, TextDiff};

use crate::errors::FixctxResult;
use crate::indexer::parser::functions_in;
use crate::models::FunctionDescriptor;

/// Before/after contents of one file touched by a fix commit.
#[derive(Clone, Debug)]
pub struct Diff {
    filename: String,
    file_before: String,
    file_after: String,
}

impl Diff {
    pub fn new(
        filename: impl Into<String>,
        file_before: impl Into<String>,
        file_after: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            file_before: file_before.into(),
            file_after: file_after.into(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn file_before(&self) -> &str {
        &self.file_before
    }

    pub fn file_after(&self) -> &str {
        &self.file_after
    }

    /// Full text of one side: the vulnerable version when `before` is set,
    /// the fixed version otherwise.
    pub fn side(&self, before: bool) -> &str {
        if before {
            &self.file_before
        } else {
            &self.file_after
        }
    }

    /// 1-based line numbers touched by the diff. Removed lines contribute
    /// their before-side number, inserted lines their after-side number.
    pub fn changed_lines(&self) -> BTreeSet<i64> {
        let diff = TextDiff::from_lines(&self.file_before, &self.file_after);
        let mut changed = BTreeSet::new();
        for change in diff.iter_all_changes() {
            let index = match change.tag() {
                ChangeTag::Delete => change.old_index(),
                ChangeTag::Insert => change.new_index(),
                ChangeTag::Equal => None,
            };
            if let Some(index) = index {
                changed.insert(index as i64 + 1);
            }
        }
        changed
    }

    /// Functions of the chosen side whose `[start_line, end_line]` contains at
    /// least one changed line, ordered by start line.
    ///
    /// Deciding what to do with zero or several matches is up to the caller.
    pub fn changed_functions(&self, before: bool) -> FixctxResult<Vec<FunctionDescriptor>> {
        let spans = functions_in(&self.filename, self.side(before))?;
        let changed = self.changed_lines();

        let functions = spans
            .into_iter()
            .filter(|span| changed.range(span.start_line..=span.end_line).next().is_some())
            .map(|span| {
                FunctionDescriptor::new(
                    span.name,
                    self.filename.clone(),
                    span.start_line,
                    Some(span.end_line),
                )
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            file = %self.filename,
            changed_lines = changed.len(),
            functions = functions.len(),
            "located changed functions"
        );
        Ok(functions)
    }

    /// Unified diff between the vulnerable and the fixed version.
    pub fn unified(&self) -> String {
        let diff = TextDiff::from_lines(&self.file_before, &self.file_after);
        let old_header = format!("{} (vulnerable)", self.filename);
        let new_header = format!("{} (fix commit)", self.filename);
        diff.unified_diff()
            .header(&old_header, &new_header)
            .to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FixctxError;

    const BEFORE: &str = "\
int a(int x)
{
    return x;
}

int b(int y)
{
    int z = y * 2;
    return z;
}
";

    fn lines(values: &[i64]) -> BTreeSet<i64> {
        values.iter().copied().collect()
    }

    #[test]
    fn test_identical_files_have_no_changes() {
        let diff = Diff::new("f.c", BEFORE, BEFORE);
        assert!(diff.changed_lines().is_empty());
        assert!(diff.changed_functions(true).unwrap().is_empty());
    }

    #[test]
    fn test_single_modified_line_is_singleton() {
        let after = BEFORE.replace("int z = y * 2;", "int z = y * 3;");
        let diff = Diff::new("f.c", BEFORE, after);
        assert_eq!(diff.changed_lines(), lines(&[8]));
    }

    #[test]
    fn test_single_modified_first_and_last_line() {
        let after = BEFORE.replacen("int a(int x)", "long a(int x)", 1);
        assert_eq!(Diff::new("f.c", BEFORE, after).changed_lines(), lines(&[1]));

        let before = "one\ntwo\nthree";
        let after = "one\ntwo\nfour";
        assert_eq!(Diff::new("f.c", before, after).changed_lines(), lines(&[3]));
    }

    #[test]
    fn test_pure_insertion_uses_after_side_number() {
        let after = BEFORE.replace(
            "    int z = y * 2;\n",
            "    int z = y * 2;\n    if (z < 0) return 0;\n",
        );
        let diff = Diff::new("f.c", BEFORE, after);
        assert_eq!(diff.changed_lines(), lines(&[9]));
    }

    #[test]
    fn test_pure_deletion_uses_before_side_number() {
        let after = BEFORE.replace("    return x;\n", "");
        let diff = Diff::new("f.c", BEFORE, after);
        assert_eq!(diff.changed_lines(), lines(&[3]));
    }

    #[test]
    fn test_changed_functions_selects_overlap_only() {
        let after = BEFORE.replace("int z = y * 2;", "int z = y * 3;");
        let diff = Diff::new("f.c", BEFORE, after);
        let functions = diff.changed_functions(true).unwrap();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "b");
        assert_eq!(functions[0].filename, "f.c");
        assert_eq!(functions[0].start_line, 6);
        assert_eq!(functions[0].end_line, Some(10));
    }

    #[test]
    fn test_changed_functions_boundary_lines_count() {
        // Touch the closing brace of `a` and the signature line of `b`.
        let after = BEFORE
            .replacen("}\n", "} \n", 1)
            .replace("int b(int y)", "int b(long y)");
        let diff = Diff::new("f.c", BEFORE, after);
        let names: Vec<String> = diff
            .changed_functions(false)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_changes_outside_functions_select_nothing() {
        let after = BEFORE.replace("}\n\nint b", "}\n/* gap */\nint b");
        let diff = Diff::new("f.c", BEFORE, after);
        assert_eq!(diff.changed_lines(), lines(&[5]));
        assert!(diff.changed_functions(true).unwrap().is_empty());
    }

    #[test]
    fn test_parse_failure_propagates() {
        let diff = Diff::new("notes.txt", "a", "b");
        assert!(matches!(
            diff.changed_functions(true),
            Err(FixctxError::Parse(_))
        ));
    }

    #[test]
    fn test_unified_headers() {
        let after = BEFORE.replace("int z = y * 2;", "int z = y * 3;");
        let unified = Diff::new("src/f.c", BEFORE, after).unified();
        assert!(unified.contains("--- src/f.c (vulnerable)"));
        assert!(unified.contains("+++ src/f.c (fix commit)"));
        assert!(unified.contains("-    int z = y * 2;"));
        assert!(unified.contains("+    int z = y * 3;"));
    }
}
