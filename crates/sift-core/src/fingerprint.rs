//! Dataset/task fingerprints used as the response cache namespace

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::TaskKind;

/// Everything that identifies what a cached response answered
#[derive(Debug, Clone)]
pub struct FingerprintParts<'a> {
    pub file_name: &'a str,
    pub index_column: &'a str,
    pub target_column: &'a str,
    pub comparison_column: Option<&'a str>,
    /// Comparison value that selects rows, for tasks that filter
    pub row_filter_label: Option<&'a str>,
    pub output_column: &'a str,
    pub task: TaskKind,
    pub model: &'a str,
    /// Sets the chunk boundaries, so a change shifts every position
    pub max_context_tokens: usize,
    /// Hash of the source file's bytes, so edits under the same name miss
    pub content_hash: &'a str,
}

/// Stable identifying string for a dataset + task combination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(parts: FingerprintParts<'_>) -> Self {
        let budget = parts.max_context_tokens.to_string();
        let fields = [
            parts.file_name,
            parts.index_column,
            parts.target_column,
            parts.comparison_column.unwrap_or(""),
            parts.row_filter_label.unwrap_or(""),
            parts.output_column,
            parts.task.id(),
            parts.model,
            budget.as_str(),
            parts.content_hash,
        ];
        Self(fields.join("|"))
    }

    /// Wrap an already-assembled identifying string
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex BLAKE3 digest of the identifying string
    pub fn digest(&self) -> String {
        blake3::hash(self.0.as_bytes()).to_hex().to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(content_hash: &str) -> FingerprintParts<'_> {
        FingerprintParts {
            file_name: "survey.xlsx",
            index_column: "no",
            target_column: "opinion",
            comparison_column: Some("category"),
            row_filter_label: None,
            output_column: "eval",
            task: TaskKind::EvaluateCategory,
            model: "gpt-4o",
            max_context_tokens: 1500,
            content_hash,
        }
    }

    #[test]
    fn test_deterministic() {
        let a = Fingerprint::new(parts("abc"));
        let b = Fingerprint::new(parts("abc"));
        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());
        assert_eq!(
            a.as_str(),
            "survey.xlsx|no|opinion|category||eval|evaluate_category|gpt-4o|1500|abc"
        );
    }

    #[test]
    fn test_content_change_changes_digest() {
        let a = Fingerprint::new(parts("abc"));
        let b = Fingerprint::new(parts("abd"));
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_chunking_settings_change_digest() {
        let base = Fingerprint::new(parts("abc"));
        let variants = [
            FingerprintParts {
                index_column: "id",
                ..parts("abc")
            },
            FingerprintParts {
                max_context_tokens: 4000,
                ..parts("abc")
            },
            FingerprintParts {
                row_filter_label: Some("의견"),
                ..parts("abc")
            },
            FingerprintParts {
                model: "gpt-4o-mini",
                ..parts("abc")
            },
        ];
        for variant in variants {
            assert_ne!(base.digest(), Fingerprint::new(variant).digest());
        }
    }
}
