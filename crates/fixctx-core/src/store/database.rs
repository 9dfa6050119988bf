//! Code database handle with a per-handle query result cache.
//!
//! Every query the rewrite passes issue is generic over the whole database, so
//! one execution per distinct query text answers it for every function that is
//! ever rewritten against this handle. Results are kept for the lifetime of the
//! handle; a database is never modified after it is built, so nothing is
//! invalidated.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::errors::FixctxResult;
use crate::models::QueryRow;

/// Something that can execute a query text against a materialized code model.
///
/// The returned rows are in select order. The first row may be a header row;
/// consumers go through [`result_rows`] to skip it.
pub trait QueryEngine: Send + Sync {
    fn execute(&self, query_text: &str) -> FixctxResult<Vec<QueryRow>>;
}

impl<E: QueryEngine + ?Sized> QueryEngine for Arc<E> {
    fn execute(&self, query_text: &str) -> FixctxResult<Vec<QueryRow>> {
        (**self).execute(query_text)
    }
}

impl<E: QueryEngine + ?Sized> QueryEngine for Box<E> {
    fn execute(&self, query_text: &str) -> FixctxResult<Vec<QueryRow>> {
        (**self).execute(query_text)
    }
}

/// Rows of a query result without the leading header row.
pub fn result_rows(rows: &[QueryRow]) -> &[QueryRow] {
    rows.get(1..).unwrap_or(&[])
}

type Slot = Arc<Mutex<Option<Arc<[QueryRow]>>>>;

// ---------------------------------------------------------------------------
// CodeDatabase
// ---------------------------------------------------------------------------

/// A queryable code model plus the results already computed against it.
///
/// Safe to share between threads. Concurrent callers asking for the same
/// query text wait on one execution instead of running it twice; different
/// texts run independently.
pub struct CodeDatabase {
    engine: Box<dyn QueryEngine>,
    cache: Mutex<HashMap<String, Slot>>,
}

impl CodeDatabase {
    pub fn new(engine: impl QueryEngine + 'static) -> Self {
        Self {
            engine: Box::new(engine),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Run `query_text`, or return the rows of its earlier run.
    ///
    /// Failures are returned to the caller and not remembered.
    pub fn query(&self, query_text: &str) -> FixctxResult<Arc<[QueryRow]>> {
        let slot = {
            let mut cache = self.cache.lock();
            cache.entry(query_text.to_string()).or_default().clone()
        };

        let mut entry = slot.lock();
        if let Some(rows) = entry.as_ref() {
            debug!(rows = rows.len(), "query cache hit");
            return Ok(rows.clone());
        }

        let started = Instant::now();
        let rows: Arc<[QueryRow]> = self.engine.execute(query_text)?.into();
        info!(
            rows = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query executed"
        );
        *entry = Some(rows.clone());
        Ok(rows)
    }

    /// Number of distinct query texts with a cached result.
    pub fn cached_queries(&self) -> usize {
        let slots: Vec<Slot> = self.cache.lock().values().cloned().collect();
        slots.iter().filter(|slot| slot.lock().is_some()).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FixctxError;
    use crate::store::memory::MemoryEngine;

    fn row(cols: &[&str]) -> QueryRow {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_result_rows_skips_header() {
        let rows = vec![row(&["col0"]), row(&["a"]), row(&["b"])];
        assert_eq!(result_rows(&rows).len(), 2);
        assert!(result_rows(&[]).is_empty());
    }

    #[test]
    fn test_same_text_executes_once() {
        let engine = Arc::new(MemoryEngine::new().with_rows("q1", vec![row(&["a", "b", "1"])]));
        let db = CodeDatabase::new(engine.clone());

        let first = db.query("q1").unwrap();
        let second = db.query("q1").unwrap();
        assert_eq!(first.len(), 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.executions(), 1);
        assert_eq!(db.cached_queries(), 1);

        db.query("q2").unwrap();
        assert_eq!(engine.executions(), 2);
        assert_eq!(db.cached_queries(), 2);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let engine = Arc::new(MemoryEngine::new().fail_on("broken"));
        let db = CodeDatabase::new(engine.clone());
        assert!(matches!(db.query("broken"), Err(FixctxError::Query(_))));
        assert!(matches!(db.query("broken"), Err(FixctxError::Query(_))));
        assert_eq!(engine.executions(), 2);
        assert_eq!(db.cached_queries(), 0);
    }

    #[test]
    fn test_concurrent_callers_share_one_execution() {
        let engine = Arc::new(MemoryEngine::new().with_rows("q", vec![row(&["x"])]));
        let db = Arc::new(CodeDatabase::new(engine.clone()));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let db = db.clone();
                scope.spawn(move || {
                    assert_eq!(db.query("q").unwrap().len(), 2);
                });
            }
        });
        assert_eq!(engine.executions(), 1);
    }
}
