//! In-memory query engine serving canned rows.
//!
//! Used for tests, benchmarks, and replaying result sets that were decoded
//! ahead of time. Unknown query texts yield an empty result.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::{FixctxError, FixctxResult};
use crate::models::QueryRow;
use crate::store::database::QueryEngine;

#[derive(Default)]
pub struct MemoryEngine {
    results: HashMap<String, Vec<QueryRow>>,
    failing: HashSet<String>,
    executions: AtomicUsize,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the data rows `query_text` returns. A header row is prepended
    /// the way a decoded result set carries one.
    pub fn with_rows(mut self, query_text: &str, rows: Vec<QueryRow>) -> Self {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let header: QueryRow = (0..width).map(|i| format!("col{i}")).collect();
        let entry = self
            .results
            .entry(query_text.to_string())
            .or_insert_with(|| vec![header]);
        entry.extend(rows);
        self
    }

    /// Make `query_text` fail the way a crashed engine would.
    pub fn fail_on(mut self, query_text: &str) -> Self {
        self.failing.insert(query_text.to_string());
        self
    }

    /// How many times `execute` ran, cached calls excluded.
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

impl QueryEngine for MemoryEngine {
    fn execute(&self, query_text: &str) -> FixctxResult<Vec<QueryRow>> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(query_text) {
            return Err(FixctxError::Query("engine failure".to_string()));
        }
        Ok(self.results.get(query_text).cloned().unwrap_or_default())
    }
}
