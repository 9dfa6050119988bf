//! Text-size oracles used for budget accounting.

use crate::errors::FixctxResult;

/// Counts tokens in a piece of text. Must be deterministic for identical
/// input; callers do not cache results.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> FixctxResult<usize>;
}

/// Character-length estimate, roughly one token per 3.5 bytes of code.
#[derive(Clone, Copy, Debug, Default)]
pub struct EstimateTokenCounter;

pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    (text.len() as f64 / 3.5).max(1.0) as usize
}

impl TokenCounter for EstimateTokenCounter {
    fn count(&self, text: &str) -> FixctxResult<usize> {
        Ok(estimate_tokens(text))
    }
}

#[cfg(feature = "hf-tokenizer")]
pub use hf::HfTokenCounter;

#[cfg(feature = "hf-tokenizer")]
mod hf {
    use std::path::Path;

    use super::TokenCounter;
    use crate::errors::{FixctxError, FixctxResult};

    /// Exact counts from a HuggingFace `tokenizer.json`, e.g. the CodeLlama
    /// tokenizer the excerpt budget was tuned against.
    pub struct HfTokenCounter {
        tokenizer: tokenizers::Tokenizer,
    }

    impl HfTokenCounter {
        pub fn from_file(path: &Path) -> FixctxResult<Self> {
            let tokenizer = tokenizers::Tokenizer::from_file(path)
                .map_err(|e| FixctxError::Tokenizer(format!("load {}: {e}", path.display())))?;
            Ok(Self { tokenizer })
        }
    }

    impl TokenCounter for HfTokenCounter {
        fn count(&self, text: &str) -> FixctxResult<usize> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| FixctxError::Tokenizer(e.to_string()))?;
            Ok(encoding.get_ids().len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_empty_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_estimate_short_text_is_at_least_one() {
        assert_eq!(estimate_tokens("a"), 1);
    }

    #[test]
    fn test_estimate_scales_with_length() {
        assert_eq!(estimate_tokens(&"x".repeat(35)), 10);
        let counter = EstimateTokenCounter;
        assert_eq!(counter.count(&"x".repeat(70)).unwrap(), 20);
    }
}
