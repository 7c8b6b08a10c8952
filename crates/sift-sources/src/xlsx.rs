use std::path::Path;

use calamine::{DataType, Reader, open_workbook_auto};
use rust_xlsxwriter::{Format, Workbook};
use sift_core::{Error, Result};

use crate::Table;
use crate::handler::TableHandler;

/// Worksheet limits of the xlsx format, header row included
const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;

/// Excel workbooks. Reads the first worksheet; writes a single sheet with a
/// bold header row.
pub struct XlsxHandler;

impl TableHandler for XlsxHandler {
    fn read(&self, path: &Path) -> Result<Table> {
        let unavailable = |reason: String| Error::SourceUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let mut workbook = open_workbook_auto(path)
            .map_err(|err| unavailable(format!("Unable to open the spreadsheet: {err}")))?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| unavailable("The workbook does not contain any worksheets.".to_string()))?;

        let range = workbook
            .worksheet_range(&sheet_name)
            .ok_or_else(|| unavailable(format!("Unable to read the worksheet named '{sheet_name}'.")))?
            .map_err(|err| unavailable(format!("Unable to read the worksheet data: {err}")))?;

        let mut rows_iter = range.rows();
        let header_row = rows_iter
            .next()
            .ok_or_else(|| unavailable("The worksheet is empty.".to_string()))?;

        let headers: Vec<String> = header_row.iter().map(cell_to_string).collect();
        let mut rows = Vec::new();

        for row in rows_iter {
            let values: Vec<String> = row.iter().map(cell_to_string).collect();
            if values.iter().all(|value| value.is_empty()) {
                continue;
            }
            rows.push(values);
        }

        Ok(Table::new(headers, rows))
    }

    fn write(&self, table: &Table, path: &Path) -> Result<()> {
        if table.headers.len() > MAX_COLUMNS || table.rows.len() + 1 > MAX_ROWS {
            return Err(anyhow::anyhow!(
                "{} rows x {} columns does not fit in an xlsx worksheet ({} x {} at most)",
                table.rows.len() + 1,
                table.headers.len(),
                MAX_ROWS,
                MAX_COLUMNS
            )
            .into());
        }

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let header_format = Format::new().set_bold();

        for (col_index, header) in table.headers.iter().enumerate() {
            sheet
                .write_string_with_format(0, excel_column(col_index)?, header, &header_format)
                .map_err(|err| anyhow::anyhow!("Unable to write the header row: {err}"))?;
        }

        for (row_index, row) in table.rows.iter().enumerate() {
            let excel_row = excel_row(row_index)?;
            for (col_index, value) in row.iter().enumerate() {
                let col = excel_column(col_index)?;
                match numeric_value(value) {
                    Some(number) => sheet.write_number(excel_row, col, number),
                    None => sheet.write_string(excel_row, col, value),
                }
                .map_err(|err| anyhow::anyhow!("Unable to write row {}: {err}", excel_row))?;
            }
        }

        workbook
            .save(path)
            .map_err(|err| anyhow::anyhow!("Unable to save {}: {err}", path.display()))?;

        Ok(())
    }

    fn can_handle(&self, extension: &str) -> bool {
        matches!(extension, "xlsx" | "xlsm" | "xls" | "xlsb")
    }
}

/// Worksheet row of a 0-based data row; row 0 holds the headers
fn excel_row(row_index: usize) -> Result<u32> {
    row_index
        .checked_add(1)
        .and_then(|row| u32::try_from(row).ok())
        .ok_or_else(|| anyhow::anyhow!("Row {row_index} is past the worksheet row limit").into())
}

fn excel_column(col_index: usize) -> Result<u16> {
    u16::try_from(col_index)
        .map_err(|_| anyhow::anyhow!("Column {col_index} is past the worksheet column limit").into())
}

fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::Empty => String::new(),
        _ => cell.to_string().trim().to_string(),
    }
}

/// Plain decimal numbers go back out as numeric cells so index columns stay
/// numeric across a read/write cycle.
fn numeric_value(value: &str) -> Option<f64> {
    let plain = !value.is_empty()
        && value
            .chars()
            .enumerate()
            .all(|(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && c == '-'))
        && value.chars().any(|c| c.is_ascii_digit())
        && !(value.len() > 1 && value.starts_with('0') && !value.starts_with("0."));
    if plain { value.parse().ok() } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_detection() {
        assert_eq!(numeric_value("12"), Some(12.0));
        assert_eq!(numeric_value("-3.5"), Some(-3.5));
        assert_eq!(numeric_value("0.25"), Some(0.25));
        assert_eq!(numeric_value("007"), None);
        assert_eq!(numeric_value("1e5"), None);
        assert_eq!(numeric_value("만족"), None);
        assert_eq!(numeric_value(""), None);
        assert_eq!(numeric_value("-"), None);
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.xlsx");
        let table = Table::new(
            vec!["no".into(), "opinion".into(), "category".into()],
            vec![
                vec!["1".into(), "식당 메뉴가 다양했으면".into(), "의견".into()],
                vec!["2".into(), "감사합니다".into(), "".into()],
            ],
        );

        XlsxHandler.write(&table, &path).unwrap();
        let read_back = XlsxHandler.read(&path).unwrap();

        assert_eq!(read_back, table);
    }

    #[test]
    fn test_cell_coordinates_never_wrap() {
        assert_eq!(excel_row(0).unwrap(), 1);
        assert_eq!(excel_column(16_383).unwrap(), 16_383);
        assert!(excel_column(70_000).is_err());
        assert!(excel_row(u32::MAX as usize).is_err());
    }

    #[test]
    fn test_too_many_columns_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.xlsx");
        let headers = (0..=MAX_COLUMNS).map(|i| format!("c{i}")).collect();
        let table = Table::new(headers, Vec::new());

        assert!(XlsxHandler.write(&table, &path).is_err());
        assert!(!path.exists());
    }
}
