//! Rewrite and engine configuration, loadable from TOML.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::FixctxResult;
use crate::query::guards::{clamp_budget, MAX_TOKEN_BUDGET, MIN_TOKEN_BUDGET};

/// Default global token ceiling for one rewritten excerpt.
pub const DEFAULT_MAX_LEN: usize = 16384;
/// Marker prefixed to every trailing fact comment.
pub const DEFAULT_COMMENT_PREFIX: &str = "//?!!";
/// Macros with a body at least this long are not resolved.
pub const DEFAULT_MACRO_BODY_LIMIT: usize = 20;

// ---------------------------------------------------------------------------
// RewriteConfig
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Global token ceiling for the expanded excerpt.
    pub max_len: usize,
    pub comment_prefix: String,
    pub macro_body_limit: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_LEN,
            comment_prefix: DEFAULT_COMMENT_PREFIX.to_string(),
            macro_body_limit: DEFAULT_MACRO_BODY_LIMIT,
        }
    }
}

impl RewriteConfig {
    pub fn from_toml_str(text: &str) -> FixctxResult<Self> {
        let parsed: Self = toml::from_str(text)?;
        Ok(parsed.normalized())
    }

    pub fn load(path: &Path) -> FixctxResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self.normalized()
    }

    fn normalized(mut self) -> Self {
        self.max_len = clamp_budget(self.max_len, MIN_TOKEN_BUDGET, MAX_TOKEN_BUDGET);
        self
    }
}

// ---------------------------------------------------------------------------
// CodeQlConfig
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CodeQlConfig {
    /// `codeql` executable, looked up on `PATH` when relative.
    pub binary: PathBuf,
    /// Query pack directory; must hold a `qlpack.yml` depending on the C/C++
    /// library so that `import cpp` resolves.
    pub query_dir: PathBuf,
    pub threads: Option<usize>,
    pub ram_mb: Option<usize>,
}

impl Default for CodeQlConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("codeql"),
            query_dir: PathBuf::from("queries"),
            threads: None,
            ram_mb: None,
        }
    }
}

impl CodeQlConfig {
    pub fn from_toml_str(text: &str) -> FixctxResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> FixctxResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
