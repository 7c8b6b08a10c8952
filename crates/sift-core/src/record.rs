//! Row records read from a source table

use serde::{Deserialize, Serialize};

/// Stable row identifier taken from the table's index column
pub type RowId = i64;

/// One row to classify: its id, the free text, and an optional label from a
/// comparison column that some tasks send along for the model to judge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRecord {
    pub row_id: RowId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_label: Option<String>,
}

impl RowRecord {
    pub fn new(row_id: RowId, text: impl Into<String>) -> Self {
        Self {
            row_id,
            text: text.into(),
            comparison_label: None,
        }
    }

    pub fn with_comparison(mut self, label: impl Into<String>) -> Self {
        self.comparison_label = Some(label.into());
        self
    }

    /// Wire form of the row inside a chunk: `id:text[:label]`.
    ///
    /// Line breaks inside the text are collapsed to spaces so one row is
    /// always one line of the prompt.
    pub fn serialize(&self) -> String {
        let text = collapse_newlines(&self.text);
        match &self.comparison_label {
            Some(label) => format!("{}:{}:{}", self.row_id, text, collapse_newlines(label)),
            None => format!("{}:{}", self.row_id, text),
        }
    }
}

fn collapse_newlines(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}
