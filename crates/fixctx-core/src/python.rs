//! Python bindings for the batch driver.
//!
//! Structured results cross the boundary as JSON decoded by Python's `json`
//! module, so callers receive plain dicts and lists.

use std::path::PathBuf;
use std::sync::Arc;

use pyo3::prelude::*;
use pyo3::wrap_pyfunction;
use serde::Serialize;

use crate::config::{CodeQlConfig, RewriteConfig};
use crate::errors::{FixctxError, FixctxResult};
use crate::indexer::diff::Diff;
use crate::models::FunctionDescriptor;
use crate::query::tokenizer::{EstimateTokenCounter, TokenCounter};
use crate::rewrite::pipeline::rewrite;
use crate::store::codeql::CodeQlEngine;
use crate::store::database::CodeDatabase;

fn to_pyobject<T: Serialize>(py: Python<'_>, value: &T) -> PyResult<PyObject> {
    let json_str = serde_json::to_string(value).map_err(FixctxError::from)?;
    let json_module = py.import("json")?;
    json_module
        .call_method1("loads", (json_str,))
        .map(|o| o.into())
}

fn token_counter(tokenizer_path: Option<PathBuf>) -> FixctxResult<Box<dyn TokenCounter>> {
    match tokenizer_path {
        None => Ok(Box::new(EstimateTokenCounter)),
        #[cfg(feature = "hf-tokenizer")]
        Some(path) => Ok(Box::new(
            crate::query::tokenizer::HfTokenCounter::from_file(&path)?,
        )),
        #[cfg(not(feature = "hf-tokenizer"))]
        Some(path) => Err(FixctxError::Tokenizer(format!(
            "cannot load {}: built without the hf-tokenizer feature",
            path.display()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// A CodeQL database with a result cache shared by every rewrite run on it.
#[pyclass]
pub struct Database {
    inner: Arc<CodeDatabase>,
    path: PathBuf,
}

#[pymethods]
impl Database {
    #[new]
    #[pyo3(signature = (db_path, config_path=None))]
    pub fn new(db_path: PathBuf, config_path: Option<PathBuf>) -> PyResult<Self> {
        let config = match config_path {
            Some(path) => CodeQlConfig::load(&path)?,
            None => CodeQlConfig::default(),
        };
        let engine = CodeQlEngine::new(config, db_path.clone());
        Ok(Self {
            inner: Arc::new(CodeDatabase::new(engine)),
            path: db_path,
        })
    }

    #[getter]
    fn db_path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    fn cached_queries(&self) -> usize {
        self.inner.cached_queries()
    }
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

#[pyfunction]
pub fn changed_lines(filename: &str, file_before: &str, file_after: &str) -> Vec<i64> {
    Diff::new(filename, file_before, file_after)
        .changed_lines()
        .into_iter()
        .collect()
}

/// Functions touched by the diff, as dicts with `name`, `filename`,
/// `start_line` and `end_line`.
#[pyfunction]
#[pyo3(signature = (filename, file_before, file_after, before=true))]
pub fn changed_functions(
    py: Python<'_>,
    filename: &str,
    file_before: &str,
    file_after: &str,
    before: bool,
) -> PyResult<PyObject> {
    let functions = Diff::new(filename, file_before, file_after).changed_functions(before)?;
    to_pyobject(py, &functions)
}

#[pyfunction]
pub fn unified_diff(filename: &str, file_before: &str, file_after: &str) -> String {
    Diff::new(filename, file_before, file_after).unified()
}

/// Rewrite one function excerpt. Returns a dict with `lines`, `original`,
/// `included` and `rounds`.
#[pyfunction]
#[pyo3(signature = (db, lines, name, filename, start_line, end_line=None, max_len=None, config_path=None, tokenizer_path=None))]
#[allow(clippy::too_many_arguments)]
pub fn rewrite_function(
    py: Python<'_>,
    db: &Database,
    lines: Vec<String>,
    name: &str,
    filename: &str,
    start_line: i64,
    end_line: Option<i64>,
    max_len: Option<usize>,
    config_path: Option<PathBuf>,
    tokenizer_path: Option<PathBuf>,
) -> PyResult<PyObject> {
    let mut config = match config_path {
        Some(path) => RewriteConfig::load(&path)?,
        None => RewriteConfig::default(),
    };
    if let Some(max_len) = max_len {
        config = config.with_max_len(max_len);
    }
    let counter = token_counter(tokenizer_path)?;
    let function = FunctionDescriptor::new(name, filename, start_line, end_line);
    let outcome = rewrite(lines, &function, &db.inner, counter.as_ref(), &config)?;
    to_pyobject(py, &outcome)
}

#[pymodule]
pub fn _fixctx_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Database>()?;

    m.add("DEFAULT_MAX_LEN", crate::config::DEFAULT_MAX_LEN)?;
    m.add("DEFAULT_COMMENT_PREFIX", crate::config::DEFAULT_COMMENT_PREFIX)?;

    m.add_function(wrap_pyfunction!(changed_lines, m)?)?;
    m.add_function(wrap_pyfunction!(changed_functions, m)?)?;
    m.add_function(wrap_pyfunction!(unified_diff, m)?)?;
    m.add_function(wrap_pyfunction!(rewrite_function, m)?)?;
    Ok(())
}
