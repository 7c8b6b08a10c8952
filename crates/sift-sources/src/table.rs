//! In-memory spreadsheet: one header row plus string cells

use sift_core::{Error, Result};

/// A rectangular table of string cells. Empty cells are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut table = Self { headers, rows };
        table.align_row_lengths();
        table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of `name`, or an `InvalidSelection` naming the available columns
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| {
            Error::InvalidSelection(format!(
                "Column '{}' not found (available: {})",
                name,
                self.headers.join(", ")
            ))
        })
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Index of `name`, appending an empty column if the table lacks it
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.headers.push(name.to_string());
        for row in self.rows.iter_mut() {
            row.push(String::new());
        }
        self.headers.len() - 1
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: impl Into<String>) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            *cell = value.into();
        }
    }

    /// Rows matching `predicate`, same headers
    pub fn filter_rows(&self, mut predicate: impl FnMut(&[String]) -> bool) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| predicate(row))
                .cloned()
                .collect(),
        }
    }

    /// Only the named columns, in the given order
    pub fn select_columns(&self, names: &[&str]) -> Result<Table> {
        let indices = names
            .iter()
            .map(|name| self.require_column(name))
            .collect::<Result<Vec<_>>>()?;

        Ok(Table {
            headers: names.iter().map(|n| n.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// Pad or truncate every row to the header width (the header grows if a
    /// row is wider).
    pub fn align_row_lengths(&mut self) {
        let column_count = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0);

        if self.headers.len() < column_count {
            self.headers.resize(column_count, String::new());
        }

        for row in self.rows.iter_mut() {
            row.resize(column_count, String::new());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::new(
            vec!["no".into(), "opinion".into()],
            vec![
                vec!["1".into(), "good".into()],
                vec!["2".into(), "bad".into(), "extra".into()],
            ],
        )
    }

    #[test]
    fn test_rows_aligned_on_construction() {
        let table = table();
        assert_eq!(table.headers.len(), 3);
        assert!(table.rows.iter().all(|r| r.len() == 3));
    }

    #[test]
    fn test_require_column() {
        let table = table();
        assert_eq!(table.require_column("opinion").unwrap(), 1);
        assert!(matches!(
            table.require_column("category"),
            Err(Error::InvalidSelection(_))
        ));
    }

    #[test]
    fn test_ensure_column_and_set_cell() {
        let mut table = table();
        let idx = table.ensure_column("category");
        assert_eq!(table.ensure_column("category"), idx);

        table.set_cell(0, idx, "만족");
        assert_eq!(table.cell(0, idx), "만족");
        assert_eq!(table.cell(1, idx), "");
        assert_eq!(table.cell(10, idx), "");
    }

    #[test]
    fn test_filter_and_select() {
        let table = table();
        let filtered = table.filter_rows(|row| row[1] == "bad");
        assert_eq!(filtered.len(), 1);

        let selected = filtered.select_columns(&["opinion", "no"]).unwrap();
        assert_eq!(selected.headers, vec!["opinion", "no"]);
        assert_eq!(selected.rows, vec![vec!["bad".to_string(), "2".to_string()]]);
    }
}
