//! Token-budgeted call-graph expansion.
//!
//! Starting from the seed function, each round collects the direct callees of
//! every function already included, annotates their bodies, and appends them
//! to the excerpt largest first. A round is bounded by a quarter of the global
//! budget so that one round cannot consume the whole excerpt; expansion stops
//! once a round adds nothing or the global budget is reached.

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexSet;
use tracing::{debug, info};

use crate::config::RewriteConfig;
use crate::errors::{FixctxError, FixctxResult};
use crate::indexer::source::read_lines;
use crate::models::{row_int, row_str, FileLocation, FunctionDescriptor};
use crate::query::guards::round_budget;
use crate::query::templates::CALL_GRAPH_QUERY;
use crate::query::tokenizer::TokenCounter;
use crate::rewrite::buffer::SourceBuffer;
use crate::rewrite::rules::annotate_all;
use crate::store::database::{result_rows, CodeDatabase};

/// Column of the callee's absolute path in a call graph row.
const CALLEE_ABSOLUTE: usize = 4;
const CALLEE_START: usize = 5;
const CALLEE_END: usize = 6;

/// A callee body ready to append.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub location: FileLocation,
    pub text: String,
    pub tokens: usize,
}

pub struct CalleeExpander<'a> {
    db: &'a CodeDatabase,
    counter: &'a dyn TokenCounter,
    config: &'a RewriteConfig,
    included: IndexSet<FileLocation>,
    rounds: usize,
}

impl<'a> CalleeExpander<'a> {
    /// Expansion state for one rewrite, holding only the seed.
    pub fn new(
        seed: &FunctionDescriptor,
        db: &'a CodeDatabase,
        counter: &'a dyn TokenCounter,
        config: &'a RewriteConfig,
    ) -> Self {
        let mut included = IndexSet::new();
        included.insert(seed.location());
        Self {
            db,
            counter,
            config,
            included,
            rounds: 0,
        }
    }

    /// Functions folded into the excerpt so far, seed first.
    pub fn included(&self) -> &IndexSet<FileLocation> {
        &self.included
    }

    pub fn into_included(self) -> Vec<FileLocation> {
        self.included.into_iter().collect()
    }

    /// Rounds that added at least one callee.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    fn is_included(&self, row: &[String], offset: usize) -> FixctxResult<bool> {
        for location in &self.included {
            if location.matches_row(row, offset)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Callees of included functions that are not included yet, annotated,
    /// largest first. Ties are broken by location so rounds are reproducible.
    pub fn candidates(&self) -> FixctxResult<Vec<Candidate>> {
        let rows = self.db.query(CALL_GRAPH_QUERY)?;
        let mut seen: HashSet<FileLocation> = HashSet::new();
        let mut candidates = Vec::new();

        for row in result_rows(&rows) {
            if !self.is_included(row, 0)? || self.is_included(row, 3)? {
                continue;
            }
            let absolute = row_str(row, CALLEE_ABSOLUTE)?;
            if absolute.is_empty() {
                continue;
            }
            let start = row_int(row, CALLEE_START)?;
            let end = row_int(row, CALLEE_END)?;
            let location = FileLocation::new(absolute, start);
            if !seen.insert(location.clone()) {
                continue;
            }

            let body = match read_lines(Path::new(absolute), start, end) {
                Ok(body) => body,
                Err(FixctxError::Source(reason)) => {
                    debug!(file = absolute, start, %reason, "dropping unreadable callee");
                    continue;
                }
                Err(other) => return Err(other),
            };

            let mut buffer = SourceBuffer::from_text(&body);
            let callee = FunctionDescriptor::placeholder(absolute, start);
            annotate_all(&mut buffer, &callee, self.db, self.config)?;
            let text = buffer.render();
            let tokens = self.counter.count(&text)?;
            candidates.push(Candidate {
                location,
                text,
                tokens,
            });
        }

        candidates.sort_by(|a, b| {
            b.tokens
                .cmp(&a.tokens)
                .then_with(|| a.location.cmp(&b.location))
        });
        Ok(candidates)
    }

    /// Run one expansion round over `buffer`. Returns whether another round
    /// is worth running.
    ///
    /// The round budget is checked before the size of the candidate, so a
    /// round may overshoot its quarter by one body; the global budget is never
    /// exceeded by an appended body.
    pub fn advance_one_round(&mut self, buffer: &mut SourceBuffer) -> FixctxResult<bool> {
        let max_len = self.config.max_len;
        let initial = round_budget(max_len);
        let mut budget = initial;
        let mut added = 0usize;

        for candidate in self.candidates()? {
            let total = self.counter.count(&buffer.render())?;
            if total + candidate.tokens < max_len && budget > 0 {
                buffer.extend(&candidate.text);
                budget -= candidate.tokens as i64;
                debug!(
                    file = %candidate.location.filename,
                    start = candidate.location.start_line,
                    tokens = candidate.tokens,
                    remaining = budget,
                    "included callee"
                );
                self.included.insert(candidate.location);
                added += 1;
            } else {
                let productive = total < max_len && budget != initial;
                self.finish_round(added, productive);
                return Ok(productive);
            }
        }

        let productive =
            budget != initial && self.counter.count(&buffer.render())? < max_len;
        self.finish_round(added, productive);
        Ok(productive)
    }

    fn finish_round(&mut self, added: usize, productive: bool) {
        if added > 0 {
            self.rounds += 1;
        }
        debug!(
            round = self.rounds,
            added,
            included = self.included.len(),
            productive,
            "expansion round finished"
        );
    }

    /// Expand until a round reports nothing more to do. Returns the number of
    /// rounds that added callees.
    pub fn run(&mut self, buffer: &mut SourceBuffer) -> FixctxResult<usize> {
        while self.advance_one_round(buffer)? {}
        info!(
            rounds = self.rounds,
            included = self.included.len(),
            "callee expansion done"
        );
        Ok(self.rounds)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
