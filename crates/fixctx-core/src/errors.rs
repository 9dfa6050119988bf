//! Error types for the fixctx core library.

/// Top-level error enum for the fixctx core library.
#[derive(Debug, thiserror::Error)]
pub enum FixctxError {
    /// The function-boundary parser could not process a file.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The code database could not execute a query, or returned rows of an
    /// unexpected shape.
    #[error("Query error: {0}")]
    Query(String),

    /// A requested source range could not be read.
    #[error("Source error: {0}")]
    Source(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<toml::de::Error> for FixctxError {
    fn from(err: toml::de::Error) -> Self {
        FixctxError::Config(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<FixctxError> for pyo3::PyErr {
    fn from(err: FixctxError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
        match &err {
            FixctxError::Parse(_) | FixctxError::Query(_) | FixctxError::Config(_) => {
                PyValueError::new_err(err.to_string())
            }
            FixctxError::Io(_) | FixctxError::Source(_) => PyIOError::new_err(err.to_string()),
            FixctxError::Tokenizer(_) | FixctxError::Json(_) | FixctxError::Csv(_) => {
                PyRuntimeError::new_err(err.to_string())
            }
        }
    }
}

pub type FixctxResult<T> = Result<T, FixctxError>;
