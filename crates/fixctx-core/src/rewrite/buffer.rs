//! Line-addressed excerpt buffer that fact comments are spliced into.
//!
//! Rows keep their index for the lifetime of the buffer: comments are only
//! ever added inside an existing row, and rows are only appended at the end
//! (callee bodies). A fact located at source line `l` of a function starting
//! at `s` therefore always lands on row `l - s`, however many comments were
//! added before it.
//!
//! Inline comments are addressed by a column of the *original* row text.
//! Each row remembers the splices made into it so that later columns are
//! shifted past the text already inserted before them.

#[derive(Clone, Debug)]
struct Row {
    body: String,
    trailing: String,
    original_chars: usize,
    /// `(original column, inserted char count)` in application order.
    splices: Vec<(usize, usize)>,
}

impl Row {
    fn new(text: String) -> Self {
        let original_chars = text.chars().count();
        Self {
            body: text,
            trailing: String::new(),
            original_chars,
            splices: Vec::new(),
        }
    }

    fn render(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + self.trailing.len());
        out.push_str(&self.body);
        out.push_str(&self.trailing);
        out
    }

    /// Inline fragments close with `*/`, so a substring match is a match of
    /// the whole comment.
    fn contains_inline(&self, fragment: &str) -> bool {
        self.body.contains(fragment) || self.trailing.contains(fragment)
    }

    /// Whether ` {prefix} {comment}` already ends the row or is followed by
    /// another trailing comment. A comment that merely starts with the same
    /// text does not count.
    fn contains_trailing(&self, fragment: &str, prefix: &str) -> bool {
        let rendered = self.render();
        let next = format!(" {prefix} ");
        rendered.match_indices(fragment).any(|(at, _)| {
            let rest = &rendered[at + fragment.len()..];
            rest.is_empty() || rest.starts_with(&next)
        })
    }

    /// Char offset in the current body that corresponds to `column` of the
    /// original text. Earlier splices at or before `column` push it right.
    fn current_offset(&self, column: usize) -> usize {
        let column = column.min(self.original_chars);
        let shift: usize = self
            .splices
            .iter()
            .filter(|(at, _)| *at <= column)
            .map(|(_, len)| *len)
            .sum();
        column + shift
    }

    fn insert_at(&mut self, column: usize, fragment: &str) {
        let column = column.min(self.original_chars);
        let offset = self.current_offset(column);
        let byte = self
            .body
            .char_indices()
            .nth(offset)
            .map(|(idx, _)| idx)
            .unwrap_or(self.body.len());
        self.body.insert_str(byte, fragment);
        self.splices.push((column, fragment.chars().count()));
    }
}

/// Ordered excerpt rows with comment splicing.
#[derive(Clone, Debug, Default)]
pub struct SourceBuffer {
    rows: Vec<Row>,
}

impl SourceBuffer {
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: lines.into_iter().map(|l| Row::new(l.into())).collect(),
        }
    }

    /// Split `text` on `\n`. A trailing newline yields a final empty row.
    pub fn from_text(text: &str) -> Self {
        Self::from_lines(text.split('\n'))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn line(&self, row: usize) -> Option<String> {
        self.rows.get(row).map(Row::render)
    }

    pub fn lines(&self) -> Vec<String> {
        self.rows.iter().map(Row::render).collect()
    }

    /// All rows joined with `\n`.
    pub fn render(&self) -> String {
        self.lines().join("\n")
    }

    /// Append ` {prefix} {comment}` to the end of `row`.
    ///
    /// Returns `false` when the row does not exist or already carries the
    /// same comment.
    pub fn append_comment(&mut self, row: usize, prefix: &str, comment: &str) -> bool {
        let fragment = format!(" {prefix} {comment}");
        let Some(target) = self.rows.get_mut(row) else {
            return false;
        };
        if target.contains_trailing(&fragment, prefix) {
            return false;
        }
        target.trailing.push_str(&fragment);
        true
    }

    /// Splice ` /* {comment} */` into `row` right after the first `column`
    /// characters of its original text. Columns past the original end are
    /// clamped to it, which still places the comment before any trailing
    /// comment.
    pub fn insert_comment_at(&mut self, row: usize, column: usize, comment: &str) -> bool {
        let fragment = format!(" /* {comment} */");
        let Some(target) = self.rows.get_mut(row) else {
            return false;
        };
        if target.contains_inline(&fragment) {
            return false;
        }
        target.insert_at(column, &fragment);
        true
    }

    /// Append the rows of `text` after the last row.
    pub fn extend(&mut self, text: &str) {
        self.rows
            .extend(text.split('\n').map(|l| Row::new(l.to_string())));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
