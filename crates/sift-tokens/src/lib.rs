//! Token counting for prompt budgeting.
//!
//! Counts are only used for sizing decisions (how many rows fit in one
//! request), so the estimator must agree with the target model's tokenizer
//! closely enough that a chunk judged "under budget" is accepted upstream.

use std::sync::Arc;

use thiserror::Error;
use tiktoken_rs::CoreBPE;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("No tokenizer known for model '{model}': {reason}")]
    UnknownModel { model: String, reason: String },
}

/// Token estimator backed by a tiktoken BPE table.
///
/// The table is immutable after construction, so one estimator can be shared
/// across dispatch workers behind an `Arc` without locking.
#[derive(Clone)]
pub struct TokenEstimator {
    bpe: Arc<CoreBPE>,
}

impl TokenEstimator {
    /// Create new estimator with cl100k_base encoding (GPT-4, GPT-3.5-turbo)
    pub fn new() -> Self {
        Self {
            bpe: Arc::new(tiktoken_rs::cl100k_base().expect("Failed to load tiktoken encoding")),
        }
    }

    /// Create an estimator matching the tokenizer of a named model
    pub fn for_model(model: &str) -> Result<Self, TokenizerError> {
        let bpe = tiktoken_rs::get_bpe_from_model(model).map_err(|e| {
            TokenizerError::UnknownModel {
                model: model.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { bpe: Arc::new(bpe) })
    }

    /// Like [`TokenEstimator::for_model`], falling back to cl100k_base for
    /// model names tiktoken does not recognise.
    pub fn for_model_or_default(model: &str) -> Self {
        Self::for_model(model).unwrap_or_default()
    }

    /// Token count for a single string
    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Token counts for multiple strings
    pub fn count_batch(&self, texts: &[&str]) -> Vec<usize> {
        texts.iter().map(|text| self.count_tokens(text)).collect()
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_count() {
        let estimator = TokenEstimator::new();

        let count = estimator.count_tokens("Hello, world!");
        assert!(count > 0 && count < 10);

        assert_eq!(estimator.count_tokens(""), 0);
    }

    #[test]
    fn test_batch_count() {
        let estimator = TokenEstimator::new();

        let texts = vec!["Hello", "world", "!"];
        let counts = estimator.count_batch(&texts);

        assert_eq!(counts.len(), 3);
        assert!(counts.iter().all(|&c| c > 0));
    }

    #[test]
    fn test_deterministic_for_korean_text() {
        let estimator = TokenEstimator::new();
        let text = "12:배송이 너무 늦어요";

        let first = estimator.count_tokens(text);
        assert!(first > 0);
        assert_eq!(first, estimator.count_tokens(text));
    }

    #[test]
    fn test_concatenation_roughly_additive() {
        let estimator = TokenEstimator::new();
        let a = "1:the service was fine";
        let b = "2:please add more parking spaces";

        let joined = estimator.count_tokens(&format!("{a}\n{b}"));
        let separate = estimator.count_tokens(a) + estimator.count_tokens(b);

        // BPE merges across the boundary are rare, never more than the newline
        assert!(joined <= separate + 1);
        assert!(joined + 2 >= separate);
    }

    #[test]
    fn test_model_lookup() {
        let estimator = TokenEstimator::for_model("gpt-3.5-turbo").unwrap();
        assert_eq!(
            estimator.count_tokens("Hello, world!"),
            TokenEstimator::new().count_tokens("Hello, world!")
        );

        assert!(TokenEstimator::for_model("definitely-not-a-model").is_err());
        let fallback = TokenEstimator::for_model_or_default("definitely-not-a-model");
        assert!(fallback.count_tokens("Hello") > 0);
    }

    #[test]
    fn test_shared_across_threads() {
        let estimator = TokenEstimator::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let estimator = estimator.clone();
                std::thread::spawn(move || estimator.count_tokens(&format!("{i}:row text")))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap() > 0);
        }
    }
}
