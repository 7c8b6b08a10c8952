use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use sift_core::{Error, Result};

use crate::Table;
use crate::handler::TableHandler;

const CANDIDATE_DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// CSV / TSV files; the delimiter is sniffed from the first lines
pub struct DelimitedHandler;

impl TableHandler for DelimitedHandler {
    fn read(&self, path: &Path) -> Result<Table> {
        let unavailable = |reason: String| Error::SourceUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let delimiter = detect_delimiter(path)?;
        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|err| unavailable(format!("Unable to open the spreadsheet: {err}")))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|err| unavailable(format!("Unable to read spreadsheet headers: {err}")))?
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let value = if i == 0 { value.trim_start_matches('\u{feff}') } else { value };
                value.trim().to_string()
            })
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|err| unavailable(format!("Unable to read spreadsheet rows: {err}")))?;
            let values: Vec<String> = record.iter().map(|value| value.trim().to_string()).collect();
            if values.iter().all(|value| value.is_empty()) {
                continue;
            }
            rows.push(values);
        }

        Ok(Table::new(headers, rows))
    }

    fn write(&self, table: &Table, path: &Path) -> Result<()> {
        let delimiter = if crate::handler::extension_of(path) == "tsv" {
            b'\t'
        } else {
            b','
        };

        let mut writer = ::csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(path)
            .map_err(|err| anyhow::anyhow!("Unable to create {}: {}", path.display(), err))?;

        writer
            .write_record(&table.headers)
            .map_err(|err| anyhow::anyhow!("Unable to write the header row: {}", err))?;
        for row in &table.rows {
            writer
                .write_record(row)
                .map_err(|err| anyhow::anyhow!("Unable to write a row: {}", err))?;
        }
        writer.flush()?;

        Ok(())
    }

    fn can_handle(&self, extension: &str) -> bool {
        matches!(extension, "csv" | "tsv" | "txt")
    }
}

/// Most frequent candidate delimiter over the first few non-empty lines
fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path).map_err(|err| Error::SourceUnavailable {
        path: path.to_path_buf(),
        reason: format!("Unable to open the spreadsheet: {err}"),
    })?;
    let reader = BufReader::new(file);

    let mut counts = [0usize; CANDIDATE_DELIMITERS.len()];
    for line in reader
        .lines()
        .map_while(std::result::Result::ok)
        .filter(|line| !line.trim().is_empty())
        .take(5)
    {
        for (count, delimiter) in counts.iter_mut().zip(CANDIDATE_DELIMITERS) {
            *count += line.bytes().filter(|b| *b == delimiter).count();
        }
    }

    let best = counts
        .iter()
        .zip(CANDIDATE_DELIMITERS)
        .max_by_key(|(count, _)| **count)
        .filter(|(count, _)| **count > 0)
        .map(|(_, delimiter)| delimiter)
        .unwrap_or(b',');

    Ok(best)
}
