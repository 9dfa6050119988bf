//! Query engine backed by the CodeQL command line.
//!
//! A query text is written into the configured query pack under a
//! content-addressed file name, run with `codeql query run`, and the binary
//! result set is decoded to CSV with `codeql bqrs decode`. The decoded header
//! row is kept as the first row.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::CodeQlConfig;
use crate::errors::{FixctxError, FixctxResult};
use crate::models::QueryRow;
use crate::store::database::QueryEngine;

pub struct CodeQlEngine {
    config: CodeQlConfig,
    database: PathBuf,
}

/// Query file name derived from the query text.
pub fn query_file_name(query_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query_text.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("query_{}.ql", &digest[..16])
}

/// Parse `codeql bqrs decode --format=csv` output into rows.
pub fn parse_csv_rows(data: &[u8]) -> FixctxResult<Vec<QueryRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

impl CodeQlEngine {
    pub fn new(config: CodeQlConfig, database: impl Into<PathBuf>) -> Self {
        Self {
            config,
            database: database.into(),
        }
    }

    pub fn database_path(&self) -> &Path {
        &self.database
    }

    fn write_query(&self, query_text: &str) -> FixctxResult<PathBuf> {
        std::fs::create_dir_all(&self.config.query_dir)?;
        let path = self.config.query_dir.join(query_file_name(query_text));
        std::fs::write(&path, query_text)?;
        Ok(path)
    }

    fn run(&self, args: &[&OsStr]) -> FixctxResult<Output> {
        let output = Command::new(&self.config.binary)
            .args(args)
            .output()
            .map_err(|e| {
                FixctxError::Query(format!(
                    "Failed to run {}: {e}",
                    self.config.binary.display()
                ))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FixctxError::Query(format!(
                "{} exited with {}: {}",
                self.config.binary.display(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

impl QueryEngine for CodeQlEngine {
    fn execute(&self, query_text: &str) -> FixctxResult<Vec<QueryRow>> {
        let query_path = self.write_query(query_text)?;
        let scratch = tempfile::Builder::new().prefix("fixctx-").tempdir()?;
        let bqrs = scratch.path().join("results.bqrs");

        let threads = self.config.threads.map(|t| format!("--threads={t}"));
        let ram = self.config.ram_mb.map(|r| format!("--ram={r}"));

        let mut args: Vec<&OsStr> = vec![
            OsStr::new("query"),
            OsStr::new("run"),
            OsStr::new("--database"),
            self.database.as_os_str(),
            OsStr::new("--output"),
            bqrs.as_os_str(),
        ];
        if let Some(threads) = &threads {
            args.push(OsStr::new(threads));
        }
        if let Some(ram) = &ram {
            args.push(OsStr::new(ram));
        }
        args.push(query_path.as_os_str());

        debug!(query = %query_path.display(), db = %self.database.display(), "running codeql query");
        self.run(&args)?;

        let decoded = self.run(&[
            OsStr::new("bqrs"),
            OsStr::new("decode"),
            OsStr::new("--format=csv"),
            bqrs.as_os_str(),
        ])?;
        parse_csv_rows(&decoded.stdout)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_file_name_is_stable() {
        let a = query_file_name("import cpp\nselect 1");
        let b = query_file_name("import cpp\nselect 1");
        let c = query_file_name("import cpp\nselect 2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("query_") && a.ends_with(".ql"));
        assert_eq!(a.len(), "query_".len() + 16 + ".ql".len());
    }

    #[test]
    fn test_parse_csv_keeps_header_and_quoting() {
        let data = b"\"col0\",\"col1\",\"col2\"\n\"src/a.c\",\"/r/src/a.c\",\"12\"\n\"x, y\",\"\"\"q\"\"\",\"3\"\n";
        let rows = parse_csv_rows(data).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["col0", "col1", "col2"]);
        assert_eq!(rows[1][2], "12");
        assert_eq!(rows[2][0], "x, y");
        assert_eq!(rows[2][1], "\"q\"");
    }

    #[test]
    fn test_missing_binary_is_query_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = CodeQlConfig {
            binary: PathBuf::from("/nonexistent/codeql-binary"),
            query_dir: dir.path().join("queries"),
            threads: None,
            ram_mb: None,
        };
        let engine = CodeQlEngine::new(config, dir.path().join("db"));
        let err = engine.execute("import cpp\nselect 1").unwrap_err();
        assert!(matches!(err, FixctxError::Query(_)));
        // The query file was still materialized in the pack.
        let written = dir
            .path()
            .join("queries")
            .join(query_file_name("import cpp\nselect 1"));
        assert!(written.exists());
    }
}
