//! Rewrite orchestration: annotate the seed excerpt, then expand it with
//! annotated callee bodies until the token budget says stop.

use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::RewriteConfig;
use crate::errors::FixctxResult;
use crate::indexer::diff::Diff;
use crate::indexer::source::excerpt;
use crate::models::{FileLocation, FunctionDescriptor};
use crate::query::tokenizer::TokenCounter;
use crate::rewrite::buffer::SourceBuffer;
use crate::rewrite::expander::CalleeExpander;
use crate::rewrite::rules::annotate_all;
use crate::store::database::CodeDatabase;

/// Result of rewriting one function.
#[derive(Clone, Debug, Serialize)]
pub struct RewriteOutcome {
    /// Annotated seed rows followed by the rows of every included callee.
    pub lines: Vec<String>,
    /// The seed excerpt as it was handed in.
    pub original: Vec<String>,
    /// Seed first, then callees in inclusion order.
    pub included: Vec<FileLocation>,
    pub rounds: usize,
}

impl RewriteOutcome {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Included locations as a JSON array of `{start_line, filename}`.
    pub fn locations_json(&self) -> FixctxResult<String> {
        Ok(serde_json::to_string(&self.included)?)
    }
}

/// Rewrite the excerpt of `function`.
///
/// `lines` are the function's source lines, first row at
/// `function.start_line`. Query failures abort the rewrite; nothing partial
/// is returned.
pub fn rewrite(
    lines: Vec<String>,
    function: &FunctionDescriptor,
    db: &CodeDatabase,
    counter: &dyn TokenCounter,
    config: &RewriteConfig,
) -> FixctxResult<RewriteOutcome> {
    let started = Instant::now();
    let mut buffer = SourceBuffer::from_lines(lines.iter().cloned());

    let annotations = annotate_all(&mut buffer, function, db, config)?;

    let mut expander = CalleeExpander::new(function, db, counter, config);
    let rounds = expander.run(&mut buffer)?;
    let included = expander.into_included();

    info!(
        function = %function.name,
        file = %function.filename,
        annotations,
        callees = included.len().saturating_sub(1),
        rounds,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "rewrite complete"
    );

    Ok(RewriteOutcome {
        lines: buffer.lines(),
        original: lines,
        included,
        rounds,
    })
}

// ---------------------------------------------------------------------------
// Batch rewriting
// ---------------------------------------------------------------------------

/// One function to rewrite together with its source lines.
#[derive(Clone, Debug)]
pub struct RewriteJob {
    pub function: FunctionDescriptor,
    pub lines: Vec<String>,
}

impl RewriteJob {
    pub fn new(function: FunctionDescriptor, lines: Vec<String>) -> Self {
        Self { function, lines }
    }

    /// Job for a changed function, excerpted from one side of `diff`.
    pub fn from_diff(diff: &Diff, function: FunctionDescriptor, before: bool) -> FixctxResult<Self> {
        let lines = excerpt(diff.side(before), &function)?;
        Ok(Self { function, lines })
    }
}

fn run_job(
    job: &RewriteJob,
    db: &CodeDatabase,
    counter: &dyn TokenCounter,
    config: &RewriteConfig,
) -> FixctxResult<RewriteOutcome> {
    rewrite(job.lines.clone(), &job.function, db, counter, config)
}

/// Rewrite many functions against one shared database handle.
///
/// Results are in job order. Every query runs at most once across the batch.
pub fn rewrite_many(
    jobs: &[RewriteJob],
    db: &CodeDatabase,
    counter: &dyn TokenCounter,
    config: &RewriteConfig,
    workers: usize,
) -> Vec<FixctxResult<RewriteOutcome>> {
    if jobs.is_empty() {
        return vec![];
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build();

    match pool {
        Ok(pool) => pool.install(|| {
            jobs.par_iter()
                .map(|job| run_job(job, db, counter, config))
                .collect()
        }),
        Err(e) => {
            warn!(error = %e, "thread pool unavailable, rewriting sequentially");
            jobs.iter()
                .map(|job| run_job(job, db, counter, config))
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FixctxError;
    use crate::models::QueryRow;
    use crate::query::templates::{CALL_GRAPH_QUERY, ENUM_CONSTANT_QUERY, NEGATIVE_TAINT_QUERY};
    use crate::query::tokenizer::EstimateTokenCounter;
    use crate::store::memory::MemoryEngine;
    use std::sync::Arc;

    fn row(cols: &[&str]) -> QueryRow {
        cols.iter().map(|c| c.to_string()).collect()
    }

    fn seed_lines() -> Vec<String> {
        ["int parse(int n)", "{", "  return n + LIMIT;", "}"]
            .iter()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn test_rewrite_annotates_and_expands() {
        let dir = tempfile::tempdir().unwrap();
        let helper = dir.path().join("helper.c");
        std::fs::write(&helper, "// header\nint helper(void)\n{\n  return 1;\n}\n").unwrap();
        let helper = helper.to_string_lossy().into_owned();

        let engine = MemoryEngine::new()
            .with_rows(
                ENUM_CONSTANT_QUERY,
                vec![row(&["src/p.c", "/r/src/p.c", "20", "22", "limits", "8", "LIMIT"])],
            )
            .with_rows(
                NEGATIVE_TAINT_QUERY,
                vec![row(&["src/p.c", "/r/src/p.c", "20", "0", "5", "20", "15"])],
            )
            .with_rows(
                CALL_GRAPH_QUERY,
                vec![row(&["src/p.c", "/r/src/p.c", "20", "helper.c", helper.as_str(), "2", "5"])],
            );
        let db = CodeDatabase::new(engine);
        let function = FunctionDescriptor::new("parse", "src/p.c", 20, Some(23));

        let outcome = rewrite(
            seed_lines(),
            &function,
            &db,
            &EstimateTokenCounter,
            &RewriteConfig::default(),
        )
        .unwrap();

        assert_eq!(
            outcome.lines,
            vec![
                "int parse(int n /* non attacker controlled value: 5 */)",
                "{",
                "  return n + LIMIT; //?!! enum const LIMIT = 8 of limits",
                "}",
                "int helper(void)",
                "{",
                "  return 1;",
                "}",
            ]
        );
        assert_eq!(outcome.original, seed_lines());
        assert_eq!(
            outcome.included,
            vec![FileLocation::new("src/p.c", 20), FileLocation::new(helper.clone(), 2)]
        );
        assert_eq!(outcome.rounds, 1);

        let json: serde_json::Value = serde_json::from_str(&outcome.locations_json().unwrap()).unwrap();
        assert_eq!(json[1]["filename"], helper.as_str());
        assert_eq!(json[1]["start_line"], 2);
    }

    #[test]
    fn test_rewrite_without_facts_is_unchanged() {
        let db = CodeDatabase::new(MemoryEngine::new());
        let function = FunctionDescriptor::new("parse", "src/p.c", 20, Some(23));
        let outcome = rewrite(
            seed_lines(),
            &function,
            &db,
            &EstimateTokenCounter,
            &RewriteConfig::default(),
        )
        .unwrap();
        assert_eq!(outcome.lines, outcome.original);
        assert_eq!(outcome.included.len(), 1);
        assert_eq!(outcome.rounds, 0);
    }

    #[test]
    fn test_rewrite_propagates_engine_failure() {
        let db = CodeDatabase::new(MemoryEngine::new().fail_on(CALL_GRAPH_QUERY));
        let function = FunctionDescriptor::new("parse", "src/p.c", 20, Some(23));
        let result = rewrite(
            seed_lines(),
            &function,
            &db,
            &EstimateTokenCounter,
            &RewriteConfig::default(),
        );
        assert!(matches!(result, Err(FixctxError::Query(_))));
    }

    #[test]
    fn test_rewrite_many_shares_query_results() {
        let engine = Arc::new(MemoryEngine::new().with_rows(
            ENUM_CONSTANT_QUERY,
            vec![
                row(&["a.c", "/r/a.c", "1", "3", "e", "1", "ONE"]),
                row(&["b.c", "/r/b.c", "1", "2", "e", "2", "TWO"]),
            ],
        ));
        let db = CodeDatabase::new(engine.clone());
        let jobs: Vec<RewriteJob> = ["a.c", "b.c", "c.c"]
            .iter()
            .map(|file| {
                RewriteJob::new(
                    FunctionDescriptor::new("f", *file, 1, Some(3)),
                    vec!["void f()".to_string(), "{ x; }".to_string(), "}".to_string()],
                )
            })
            .collect();

        let results = rewrite_many(&jobs, &db, &EstimateTokenCounter, &RewriteConfig::default(), 3);
        assert_eq!(results.len(), 3);
        let outcomes: Vec<RewriteOutcome> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(outcomes[0].lines[2], "} //?!! enum const ONE = 1 of e");
        assert_eq!(outcomes[1].lines[1], "{ x; } //?!! enum const TWO = 2 of e");
        assert_eq!(outcomes[2].lines, outcomes[2].original);

        // Six rules plus the call graph, each executed once for the batch.
        assert_eq!(engine.executions(), 7);
        assert_eq!(db.cached_queries(), 7);
    }

    #[test]
    fn test_job_from_diff_takes_requested_side() {
        let before = "int f(void)\n{\n  return 1;\n}\n";
        let after = "int f(void)\n{\n  return 2;\n}\n";
        let diff = Diff::new("f.c", before, after);
        let function = FunctionDescriptor::new("f", "f.c", 1, Some(4));
        let job = RewriteJob::from_diff(&diff, function.clone(), false).unwrap();
        assert_eq!(job.lines[2], "  return 2;");
        let job = RewriteJob::from_diff(&diff, function, true).unwrap();
        assert_eq!(job.lines[2], "  return 1;");
    }
}
