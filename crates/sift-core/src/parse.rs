//! Response parser
//!
//! Model replies are advisory: they are supposed to be one `index:value`
//! line per row but drift in practice (ranges like `41-44: value`, lists,
//! chatter without a colon). The parser extracts whatever `index:value`
//! signal a reply carries and reports the lines it had to skip.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::RowId;

/// Partial mapping from row id to label for one reply
pub type LabelMap = BTreeMap<RowId, String>;

/// Separators that turn the index part into several indices, in priority order
const INDEX_SEPARATORS: [char; 3] = ['-', '~', ','];

/// Widest `a-b` range expanded to individual indices
const MAX_RANGE_SPAN: RowId = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseIssue {
    MissingColon,
    InvalidIndex(String),
    RangeTooWide { start: RowId, end: RowId },
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseIssue::MissingColon => write!(f, "no ':' separator"),
            ParseIssue::InvalidIndex(part) => write!(f, "'{}' is not a row index", part),
            ParseIssue::RangeTooWide { start, end } => {
                write!(f, "range {}-{} spans more than {} rows", start, end, MAX_RANGE_SPAN)
            }
        }
    }
}

/// A reply line that was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    /// Chunk position of the reply, filled in during reconciliation
    pub position: Option<usize>,
    /// 1-based among the non-empty lines of the reply
    pub line_number: usize,
    pub line: String,
    pub issue: ParseIssue,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(
                f,
                "Unexpected format in response {}, line {} ({}): {}",
                position, self.line_number, self.issue, self.line
            ),
            None => write!(
                f,
                "Unexpected format in line {} ({}): {}",
                self.line_number, self.issue, self.line
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub labels: LabelMap,
    pub warnings: Vec<ParseWarning>,
}

/// Decode one reply into a partial label map.
///
/// Never fails: unusable lines become warnings. Within a reply, a later line
/// for the same index overrides an earlier one.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let mut parsed = ParsedResponse::default();

    let lines = raw.lines().map(str::trim).filter(|line| !line.is_empty());

    for (idx, line) in lines.enumerate() {
        let line_number = idx + 1;

        let Some((indices_part, value)) = line.split_once(':') else {
            push_warning(&mut parsed, line_number, line, ParseIssue::MissingColon);
            continue;
        };

        let indices = match parse_indices(indices_part.trim()) {
            Ok(indices) => indices,
            Err(issue) => {
                push_warning(&mut parsed, line_number, line, issue);
                continue;
            }
        };

        let value = value.trim();
        for index in indices {
            parsed.labels.insert(index, value.to_string());
        }
    }

    parsed
}

fn push_warning(parsed: &mut ParsedResponse, line_number: usize, line: &str, issue: ParseIssue) {
    warn!("Unexpected format in line {} ({}): {}", line_number, issue, line);
    parsed.warnings.push(ParseWarning {
        position: None,
        line_number,
        line: line.to_string(),
        issue,
    });
}

fn parse_indices(part: &str) -> Result<Vec<RowId>, ParseIssue> {
    let Some(separator) = INDEX_SEPARATORS.into_iter().find(|sep| part.contains(*sep)) else {
        return parse_index(part).map(|index| vec![index]);
    };

    let indices = part
        .split(separator)
        .map(|piece| parse_index(piece.trim()))
        .collect::<Result<Vec<_>, _>>()?;

    // `3-5` and `3~5` name every row in between
    match (separator, indices.as_slice()) {
        ('-' | '~', &[start, end]) if start <= end => {
            if end - start > MAX_RANGE_SPAN {
                return Err(ParseIssue::RangeTooWide { start, end });
            }
            Ok((start..=end).collect())
        }
        _ => Ok(indices),
    }
}

fn parse_index(part: &str) -> Result<RowId, ParseIssue> {
    part.parse::<RowId>()
        .map_err(|_| ParseIssue::InvalidIndex(part.to_string()))
}
