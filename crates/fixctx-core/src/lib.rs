//! fixctx core library: rewrites the functions touched by a vulnerability fix
//! into self-contained, annotated excerpts.
//!
//! A [`indexer::diff::Diff`] locates the functions a fix changed. Each one is
//! rewritten against a prebuilt code database: whole-database fact queries
//! (`rewrite::rules`) annotate the excerpt with comments, and the call graph
//! (`rewrite::expander`) pulls in annotated callee bodies under a token
//! budget. Query results are cached per database handle, so rewriting many
//! functions costs one execution per distinct query.
//!
//! With the `python` feature the crate also builds as the `_fixctx_core`
//! extension module used by the batch driver.

pub mod config;
pub mod errors;
pub mod indexer;
pub mod models;
pub mod query;
pub mod rewrite;
pub mod store;

#[cfg(feature = "python")]
mod python;
