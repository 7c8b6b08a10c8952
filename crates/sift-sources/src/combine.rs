//! Table utilities: joining results back, combining, concatenating, dividing

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use sift_core::Result;
use tracing::debug;

use crate::Table;

static NATURAL_PARTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+|\D+").expect("valid natural sort pattern"));

/// Outcome of [`combine`]
#[derive(Debug, Clone)]
pub struct CombineResult {
    /// Base rows with the extra table's new columns joined on
    pub combined: Table,
    /// The extra table without the columns it shares with base
    pub extra: Table,
    /// Index values whose check column differs between the two tables
    pub mismatches: Vec<String>,
    /// False when the check column is missing from either table
    pub checked: bool,
}

/// Left-join `extra` onto `base` on `index_column`.
///
/// Columns present in both (other than the index) are taken from `base`.
/// Before joining, rows present in both whose `check_column` differs are
/// reported in `mismatches`.
pub fn combine(
    base: &Table,
    extra: &Table,
    index_column: &str,
    check_column: &str,
) -> Result<CombineResult> {
    let base_index = base.require_column(index_column)?;
    let extra_index = extra.require_column(index_column)?;

    let (mismatches, checked) =
        match (base.column_index(check_column), extra.column_index(check_column)) {
            (Some(base_check), Some(extra_check)) => {
                let extra_values = first_by_key(extra, extra_index, extra_check);
                let mismatches = base
                    .rows
                    .iter()
                    .filter_map(|row| {
                        let key = row[base_index].as_str();
                        let other = extra_values.get(key)?;
                        (row[base_check] != **other).then(|| key.to_string())
                    })
                    .collect();
                (mismatches, true)
            }
            _ => (Vec::new(), false),
        };

    let kept_columns: Vec<usize> = extra
        .headers
        .iter()
        .enumerate()
        .filter(|(i, header)| *i == extra_index || base.column_index(header).is_none())
        .map(|(i, _)| i)
        .collect();

    let extra_trimmed = Table {
        headers: kept_columns.iter().map(|&i| extra.headers[i].clone()).collect(),
        rows: extra
            .rows
            .iter()
            .map(|row| kept_columns.iter().map(|&i| row[i].clone()).collect())
            .collect(),
    };

    let joined_columns: Vec<usize> = kept_columns
        .iter()
        .copied()
        .filter(|&i| i != extra_index)
        .collect();

    let mut extra_rows: HashMap<&str, &Vec<String>> = HashMap::new();
    for row in &extra.rows {
        extra_rows.entry(row[extra_index].as_str()).or_insert(row);
    }

    let mut combined = base.clone();
    combined
        .headers
        .extend(joined_columns.iter().map(|&i| extra.headers[i].clone()));
    for row in combined.rows.iter_mut() {
        let matched = extra_rows.get(row[base_index].as_str()).copied();
        row.extend(
            joined_columns
                .iter()
                .map(|&i| matched.map(|m| m[i].clone()).unwrap_or_default()),
        );
    }

    debug!(
        "Combined {} base rows with {} extra rows ({} new columns)",
        base.len(),
        extra.len(),
        joined_columns.len()
    );

    Ok(CombineResult {
        combined,
        extra: extra_trimmed,
        mismatches,
        checked,
    })
}

/// Copy `column` from `source` into `target`, matching rows on
/// `index_column`.
///
/// Non-empty source values overwrite; target rows with no match, or whose
/// match is empty, keep what they had. The column is created if missing.
/// Returns the number of cells written.
pub fn merge_column(
    target: &mut Table,
    source: &Table,
    index_column: &str,
    column: &str,
) -> Result<usize> {
    let target_index = target.require_column(index_column)?;
    let source_index = source.require_column(index_column)?;
    let source_column = source.require_column(column)?;

    let values = first_by_key(source, source_index, source_column);
    let target_column = target.ensure_column(column);

    let mut written = 0;
    for row in target.rows.iter_mut() {
        if let Some(value) = values.get(row[target_index].as_str())
            && !value.is_empty()
        {
            row[target_column] = value.to_string();
            written += 1;
        }
    }

    Ok(written)
}

/// Stack tables under the union of their headers, in the given order.
pub fn concatenate(tables: &[Table]) -> Table {
    let mut headers: Vec<String> = Vec::new();
    for table in tables {
        for header in &table.headers {
            if !headers.contains(header) {
                headers.push(header.clone());
            }
        }
    }

    let mut rows = Vec::new();
    for table in tables {
        let mapping: Vec<Option<usize>> = headers.iter().map(|h| table.column_index(h)).collect();
        for row in &table.rows {
            rows.push(
                mapping
                    .iter()
                    .map(|idx| idx.map(|i| row[i].clone()).unwrap_or_default())
                    .collect(),
            );
        }
    }

    Table::new(headers, rows)
}

/// Split a table by the distinct values of `column`, in first-seen order.
pub fn divide(table: &Table, column: &str) -> Result<Vec<(String, Table)>> {
    let column_index = table.require_column(column)?;

    let mut groups: Vec<(String, Table)> = Vec::new();
    for row in &table.rows {
        let key = &row[column_index];
        match groups.iter_mut().find(|(value, _)| value == key) {
            Some((_, group)) => group.rows.push(row.clone()),
            None => groups.push((
                key.clone(),
                Table {
                    headers: table.headers.clone(),
                    rows: vec![row.clone()],
                },
            )),
        }
    }

    Ok(groups)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NaturalPart {
    Number(u128),
    Text(String),
}

impl PartialOrd for NaturalPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NaturalPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (NaturalPart::Number(a), NaturalPart::Number(b)) => a.cmp(b),
            (NaturalPart::Text(a), NaturalPart::Text(b)) => a.cmp(b),
            (NaturalPart::Number(_), NaturalPart::Text(_)) => Ordering::Less,
            (NaturalPart::Text(_), NaturalPart::Number(_)) => Ordering::Greater,
        }
    }
}

/// Sort key that orders embedded numbers numerically (`2` before `10`) and
/// text case-insensitively.
pub fn natural_sort_key(s: &str) -> Vec<NaturalPart> {
    NATURAL_PARTS
        .find_iter(s)
        .map(|m| {
            let part = m.as_str();
            match part.parse::<u128>() {
                Ok(n) if part.bytes().all(|b| b.is_ascii_digit()) => NaturalPart::Number(n),
                _ => NaturalPart::Text(part.to_lowercase()),
            }
        })
        .collect()
}

fn first_by_key(table: &Table, key_column: usize, value_column: usize) -> HashMap<&str, &str> {
    let mut values = HashMap::new();
    for row in &table.rows {
        values
            .entry(row[key_column].as_str())
            .or_insert(row[value_column].as_str());
    }
    values
}
