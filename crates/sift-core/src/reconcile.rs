//! Merging parsed replies into a label column

use serde::{Deserialize, Serialize};

use crate::{ChunkResponse, LabelMap, ParseWarning, RowId, parse_response};

/// Labels for the rows of a working table, in table order.
///
/// Merging is non-destructive: a row that already has a label keeps it, so
/// across sequentially merged replies the first non-null label per row wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelColumn {
    entries: Vec<(RowId, Option<String>)>,
}

impl LabelColumn {
    /// An all-null column for the given rows
    pub fn new(row_ids: impl IntoIterator<Item = RowId>) -> Self {
        Self {
            entries: row_ids.into_iter().map(|id| (id, None)).collect(),
        }
    }

    /// A column that already holds some labels
    pub fn from_existing(entries: Vec<(RowId, Option<String>)>) -> Self {
        Self { entries }
    }

    /// Fill null rows from `partial`; returns how many rows were filled.
    pub fn merge(&mut self, partial: &LabelMap) -> usize {
        let mut filled = 0;
        for (row_id, label) in self.entries.iter_mut() {
            if label.is_some() {
                continue;
            }
            if let Some(value) = partial.get(row_id) {
                *label = Some(value.clone());
                filled += 1;
            }
        }
        filled
    }

    pub fn get(&self, row_id: RowId) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| *id == row_id)
            .and_then(|(_, label)| label.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labelled_count(&self) -> usize {
        self.entries.iter().filter(|(_, label)| label.is_some()).count()
    }

    /// Rows no reply produced a label for
    pub fn unlabelled(&self) -> Vec<RowId> {
        self.entries
            .iter()
            .filter(|(_, label)| label.is_none())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RowId, Option<&str>)> {
        self.entries
            .iter()
            .map(|(id, label)| (*id, label.as_deref()))
    }

    pub fn into_entries(self) -> Vec<(RowId, Option<String>)> {
        self.entries
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub column: LabelColumn,
    pub warnings: Vec<ParseWarning>,
}

/// Parse every reply and merge them, in the given order, into a fresh column
/// for `row_ids`.
///
/// `responses` must already be sorted by chunk position.
pub fn reconcile(
    row_ids: impl IntoIterator<Item = RowId>,
    responses: &[ChunkResponse],
) -> Reconciliation {
    let mut reconciliation = Reconciliation {
        column: LabelColumn::new(row_ids),
        warnings: Vec::new(),
    };

    for chunk in responses {
        let parsed = parse_response(&chunk.response);
        reconciliation.column.merge(&parsed.labels);
        reconciliation
            .warnings
            .extend(parsed.warnings.into_iter().map(|mut warning| {
                warning.position = Some(chunk.position);
                warning
            }));
    }

    reconciliation
}
