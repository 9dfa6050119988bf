//! Fact annotators.
//!
//! Each rule pairs one whole-database query with a renderer that turns the
//! rows attributed to a single function into comments. Rules are data: the
//! shared [`annotate`] driver fetches rows through the database cache, keeps
//! the ones whose leading location columns name the function, renders facts,
//! and places them into the buffer at `fact line - function start line`.

use std::borrow::Cow;
use std::collections::BTreeSet;

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::config::RewriteConfig;
use crate::errors::{FixctxError, FixctxResult};
use crate::models::{row_int, row_matches, row_str, FunctionDescriptor, LOCATION_COLUMNS};
use crate::query::templates;
use crate::rewrite::buffer::SourceBuffer;
use crate::store::database::{result_rows, CodeDatabase};

/// Declared type name the engine reports for an anonymous enum.
const UNNAMED_ENUM: &str = "(unnamed enum)";
/// Truncation marker in values the engine abbreviates.
const ELLIPSIS: &str = "...";
const MAX_GLOBAL_VALUES: usize = 4;
const MAX_LISTED_TAINT_VALUES: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RuleKind {
    EnumConstant,
    ShortMacro,
    IntegralTypedef,
    GlobalVariable,
    NegativeTaint,
    RemoteSourceFlow,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::EnumConstant => "enum_constant",
            RuleKind::ShortMacro => "short_macro",
            RuleKind::IntegralTypedef => "integral_typedef",
            RuleKind::GlobalVariable => "global_variable",
            RuleKind::NegativeTaint => "negative_taint",
            RuleKind::RemoteSourceFlow => "remote_source_flow",
        }
    }
}

/// Where a rendered fact goes on its row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// End of the row, after the comment prefix.
    Trailing,
    /// Spliced after this many characters of the original row.
    Inline(usize),
}

/// A rendered comment anchored at a source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fact {
    pub line: i64,
    pub placement: Placement,
    pub text: String,
}

impl Fact {
    fn trailing(line: i64, text: String) -> Self {
        Self {
            line,
            placement: Placement::Trailing,
            text,
        }
    }
}

pub struct AnnotationRule {
    pub kind: RuleKind,
    /// Columns each row carries after the three location columns.
    pub payload_columns: usize,
    query: fn(&RewriteConfig) -> Cow<'static, str>,
    render: fn(&[&[String]]) -> FixctxResult<Vec<Fact>>,
}

impl AnnotationRule {
    pub fn query_text(&self, config: &RewriteConfig) -> Cow<'static, str> {
        (self.query)(config)
    }

    /// Render the facts for payload rows already attributed to one function.
    pub fn render(&self, payloads: &[&[String]]) -> FixctxResult<Vec<Fact>> {
        (self.render)(payloads)
    }
}

/// Every rule, in the order a rewrite applies them.
pub static RULES: [AnnotationRule; 6] = [
    AnnotationRule {
        kind: RuleKind::EnumConstant,
        payload_columns: 4,
        query: enum_query,
        render: render_enum_constants,
    },
    AnnotationRule {
        kind: RuleKind::ShortMacro,
        payload_columns: 4,
        query: macro_query,
        render: render_short_macros,
    },
    AnnotationRule {
        kind: RuleKind::IntegralTypedef,
        payload_columns: 3,
        query: typedef_query,
        render: render_integral_typedefs,
    },
    AnnotationRule {
        kind: RuleKind::GlobalVariable,
        payload_columns: 4,
        query: global_query,
        render: render_global_variables,
    },
    AnnotationRule {
        kind: RuleKind::NegativeTaint,
        payload_columns: 4,
        query: taint_query,
        render: render_negative_taint,
    },
    AnnotationRule {
        kind: RuleKind::RemoteSourceFlow,
        payload_columns: 3,
        query: flow_query,
        render: render_remote_source_flow,
    },
];

pub fn rule(kind: RuleKind) -> &'static AnnotationRule {
    match kind {
        RuleKind::EnumConstant => &RULES[0],
        RuleKind::ShortMacro => &RULES[1],
        RuleKind::IntegralTypedef => &RULES[2],
        RuleKind::GlobalVariable => &RULES[3],
        RuleKind::NegativeTaint => &RULES[4],
        RuleKind::RemoteSourceFlow => &RULES[5],
    }
}

fn enum_query(_: &RewriteConfig) -> Cow<'static, str> {
    Cow::Borrowed(templates::ENUM_CONSTANT_QUERY)
}

fn macro_query(config: &RewriteConfig) -> Cow<'static, str> {
    Cow::Owned(templates::short_macro_query(config.macro_body_limit))
}

fn typedef_query(_: &RewriteConfig) -> Cow<'static, str> {
    Cow::Borrowed(templates::INTEGRAL_TYPEDEF_QUERY)
}

fn global_query(_: &RewriteConfig) -> Cow<'static, str> {
    Cow::Borrowed(templates::GLOBAL_VARIABLE_QUERY)
}

fn taint_query(_: &RewriteConfig) -> Cow<'static, str> {
    Cow::Borrowed(templates::NEGATIVE_TAINT_QUERY)
}

fn flow_query(_: &RewriteConfig) -> Cow<'static, str> {
    Cow::Borrowed(templates::REMOTE_SOURCE_FLOW_QUERY)
}

// ---------------------------------------------------------------------------
// Renderers
// ---------------------------------------------------------------------------

/// Keep the earliest row per key; keys stay in first-seen order.
///
/// A key must identify the fact completely, so the kept row's line and text
/// always come from the same row.
fn earliest_per_key(facts: impl IntoIterator<Item = (String, i64, String)>) -> Vec<Fact> {
    let mut by_key: IndexMap<String, (i64, String)> = IndexMap::new();
    for (key, line, text) in facts {
        match by_key.get_mut(&key) {
            Some(entry) if line < entry.0 => *entry = (line, text),
            Some(_) => {}
            None => {
                by_key.insert(key, (line, text));
            }
        }
    }
    by_key
        .into_values()
        .map(|(line, text)| Fact::trailing(line, text))
        .collect()
}

fn render_enum_constants(payloads: &[&[String]]) -> FixctxResult<Vec<Fact>> {
    let mut facts = Vec::with_capacity(payloads.len());
    for row in payloads {
        let line = row_int(row, 0)?;
        let enum_type = row_str(row, 1)?;
        let value = row_str(row, 2)?;
        let name = row_str(row, 3)?;
        let mut text = format!("enum const {name} = {value}");
        if enum_type != UNNAMED_ENUM {
            text.push_str(&format!(" of {enum_type}"));
        }
        facts.push((format!("{name}\u{0}{enum_type}\u{0}{value}"), line, text));
    }
    Ok(earliest_per_key(facts))
}

fn render_short_macros(payloads: &[&[String]]) -> FixctxResult<Vec<Fact>> {
    let mut facts = Vec::with_capacity(payloads.len());
    for row in payloads {
        let line = row_int(row, 0)?;
        let name = row_str(row, 1)?;
        let body = row_str(row, 2)?;
        facts.push((
            format!("{name}\u{0}{body}"),
            line,
            format!("macro {name} = {body}"),
        ));
    }
    Ok(earliest_per_key(facts))
}

fn render_integral_typedefs(payloads: &[&[String]]) -> FixctxResult<Vec<Fact>> {
    let mut facts = Vec::with_capacity(payloads.len());
    for row in payloads {
        let line = row_int(row, 0)?;
        let typename = row_str(row, 1)?;
        let resolved = row_str(row, 2)?;
        if typename == resolved || resolved.contains("unnamed") || resolved.contains('.') {
            continue;
        }
        facts.push((
            format!("{typename}\u{0}{resolved}"),
            line,
            format!("typedef {typename} {resolved}"),
        ));
    }
    Ok(earliest_per_key(facts))
}

struct GlobalGroup {
    type_name: String,
    values: BTreeSet<String>,
    line: i64,
}

fn render_global_variables(payloads: &[&[String]]) -> FixctxResult<Vec<Fact>> {
    let mut groups: IndexMap<String, GlobalGroup> = IndexMap::new();
    for row in payloads {
        let name = row_str(row, 0)?;
        let type_name = row_str(row, 1)?;
        let value = row_str(row, 2)?;
        let line = row_int(row, 3)?;
        let group = groups
            .entry(name.to_string())
            .or_insert_with(|| GlobalGroup {
                type_name: type_name.to_string(),
                values: BTreeSet::new(),
                line,
            });
        group.values.insert(value.to_string());
        group.line = group.line.min(line);
    }

    let facts = groups
        .into_iter()
        .map(|(name, group)| {
            Fact::trailing(group.line, describe_global(&name, &group.type_name, &group.values))
        })
        .collect();
    Ok(facts)
}

/// `global variable NAME (TYPE)` plus what is known about its values.
fn describe_global(name: &str, type_name: &str, values: &BTreeSet<String>) -> String {
    let mut text = format!("global variable {name} ({type_name})");
    let concrete: Vec<&str> = values
        .iter()
        .map(String::as_str)
        .filter(|v| !v.contains(ELLIPSIS))
        .collect();

    if concrete.len() == 1 && values.len() > 1 {
        text.push_str(&format!(", value e.g. {}", concrete[0]));
    } else if !concrete.is_empty() {
        let listed: Vec<&str> = concrete.iter().take(MAX_GLOBAL_VALUES).copied().collect();
        text.push_str(" is: ");
        text.push_str(&listed.join(" or "));
        if concrete.len() < values.len() || concrete.len() > MAX_GLOBAL_VALUES {
            text.push_str(", ...");
        }
    }
    text
}

struct TaintGroup {
    values: IndexSet<String>,
    unknown: bool,
    line: i64,
    column: i64,
}

fn render_negative_taint(payloads: &[&[String]]) -> FixctxResult<Vec<Fact>> {
    let mut groups: IndexMap<i64, TaintGroup> = IndexMap::new();
    for row in payloads {
        let index = row_int(row, 0)?;
        let value = row_str(row, 1)?;
        let line = row_int(row, 2)?;
        let column = row_int(row, 3)?;
        let group = groups.entry(index).or_insert_with(|| TaintGroup {
            values: IndexSet::new(),
            unknown: false,
            line,
            column,
        });
        if value == templates::UNKNOWN_ARGUMENT {
            group.unknown = true;
        } else {
            group.values.insert(value.to_string());
        }
    }

    let mut facts = Vec::new();
    for (index, group) in groups {
        // One call site with an unknown argument means it may be attacker controlled.
        if group.unknown || group.values.is_empty() {
            debug!(param = index, "parameter has a non-constant argument, no taint fact");
            continue;
        }
        let text = if group.values.len() <= MAX_LISTED_TAINT_VALUES {
            let listed: Vec<&str> = group.values.iter().map(String::as_str).collect();
            format!("non attacker controlled value: {}", listed.join(", "))
        } else {
            "non attacker controlled value".to_string()
        };
        facts.push(Fact {
            line: group.line,
            placement: Placement::Inline(column_index(group.column)),
            text,
        });
    }
    Ok(facts)
}

fn render_remote_source_flow(payloads: &[&[String]]) -> FixctxResult<Vec<Fact>> {
    let mut seen: IndexSet<(String, i64, i64)> = IndexSet::new();
    for row in payloads {
        let source = row_str(row, 0)?;
        let line = row_int(row, 1)?;
        let column = row_int(row, 2)?;
        seen.insert((source.to_string(), line, column));
    }
    Ok(seen
        .into_iter()
        .map(|(source, line, column)| Fact {
            line,
            placement: Placement::Inline(column_index(column)),
            text: format!("data flow from {source}"),
        })
        .collect())
}

/// Inclusive 1-based end column to the number of characters preceding the
/// splice point.
fn column_index(end_column: i64) -> usize {
    end_column.max(0) as usize
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Apply one rule to `buffer`, the excerpt of `function`. Returns how many
/// comments were inserted.
///
/// Facts whose line falls outside the buffer are skipped. An engine failure or
/// a row with missing or malformed columns is an error.
pub fn annotate(
    buffer: &mut SourceBuffer,
    function: &FunctionDescriptor,
    db: &CodeDatabase,
    config: &RewriteConfig,
    rule: &AnnotationRule,
) -> FixctxResult<usize> {
    let rows = db.query(&rule.query_text(config))?;

    let mut payloads: Vec<&[String]> = Vec::new();
    for row in result_rows(&rows) {
        if !row_matches(row, 0, &function.filename, function.start_line)? {
            continue;
        }
        let payload = &row[LOCATION_COLUMNS..];
        if payload.len() < rule.payload_columns {
            return Err(FixctxError::Query(format!(
                "{} row has {} payload columns, expected {}",
                rule.kind.as_str(),
                payload.len(),
                rule.payload_columns
            )));
        }
        payloads.push(payload);
    }

    let mut inserted = 0;
    for fact in rule.render(&payloads)? {
        let offset = fact.line - function.start_line;
        if offset < 0 || offset as usize >= buffer.len() {
            debug!(
                rule = rule.kind.as_str(),
                line = fact.line,
                start = function.start_line,
                "fact outside excerpt"
            );
            continue;
        }
        let row = offset as usize;
        let added = match fact.placement {
            Placement::Trailing => buffer.append_comment(row, &config.comment_prefix, &fact.text),
            Placement::Inline(column) => buffer.insert_comment_at(row, column, &fact.text),
        };
        if added {
            inserted += 1;
        }
    }

    debug!(
        rule = rule.kind.as_str(),
        function = %function.name,
        matched = payloads.len(),
        inserted,
        "annotated"
    );
    Ok(inserted)
}

/// Apply every rule in order.
pub fn annotate_all(
    buffer: &mut SourceBuffer,
    function: &FunctionDescriptor,
    db: &CodeDatabase,
    config: &RewriteConfig,
) -> FixctxResult<usize> {
    let mut inserted = 0;
    for rule in RULES.iter() {
        inserted += annotate(buffer, function, db, config, rule)?;
    }
    Ok(inserted)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
