//! Delimited-text import parsing.
//!
//! The input is comma-separated text with a header row. Two columns are
//! required: `text` and `intent`. Every other column is carried through
//! verbatim; the ingestion pipeline decides which headers name known
//! entities. Quoting and escaping follow standard CSV rules, so fields may
//! contain delimiters and newlines.
//!
//! Stream-level problems (no usable header, a missing required column)
//! abort parsing before any row is produced. Row-level problems become
//! [`RowParseError`] records in the output so the caller can fail rows
//! individually instead of the whole batch.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Required column holding the sample text.
pub const TEXT_COLUMN: &str = "text";
/// Required column holding the intent label.
pub const INTENT_COLUMN: &str = "intent";
/// Sentinel intent marking a row as not trainable; such rows are filtered
/// out before processing.
pub const NONE_INTENT: &str = "none";

/// One successfully parsed import row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    /// 1-based line of the input where the row starts.
    pub line: u64,
    /// Value of the `text` column.
    pub text: String,
    /// Value of the `intent` column.
    pub intent: String,
    /// Remaining columns as (header, value), in header order.
    pub columns: Vec<(String, String)>,
}

impl ImportRow {
    /// Value of a named extra column, if present and non-empty.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(header, _)| header == name)
            .map(|(_, value)| value.as_str())
            .filter(|v| !v.trim().is_empty())
    }
}

/// A row that could not be parsed, with enough context to report it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowParseError {
    /// 1-based line of the input.
    pub line: u64,
    /// What went wrong.
    pub message: String,
}

/// Per-row parse outcome. The caller decides whether a failed row aborts
/// anything; this module never does.
pub type ParsedRow = std::result::Result<ImportRow, RowParseError>;

/// Parse delimited import input into ordered row records.
///
/// Rows whose intent equals [`NONE_INTENT`] are filtered out here, before
/// any downstream processing. Returns [`Error::Parse`] only for
/// stream-level failures; malformed individual rows appear as `Err`
/// entries in the returned sequence.
pub fn parse_delimited(raw: &str) -> Result<Vec<ParsedRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(raw.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| Error::parse(1, None, format!("unreadable header row: {e}")))?
        .clone();

    let text_idx = column_index(&headers, TEXT_COLUMN)?;
    let intent_idx = column_index(&headers, INTENT_COLUMN)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => {
                let line = record.position().map_or(0, |p| p.line());
                let intent = record.get(intent_idx).unwrap_or("").trim().to_string();
                if intent == NONE_INTENT {
                    log::debug!("line {line}: intent is \"{NONE_INTENT}\", row filtered");
                    continue;
                }
                let text = record.get(text_idx).unwrap_or("").to_string();
                let columns = headers
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != text_idx && *i != intent_idx)
                    .map(|(i, header)| {
                        (header.to_string(), record.get(i).unwrap_or("").to_string())
                    })
                    .collect();
                rows.push(Ok(ImportRow {
                    line,
                    text,
                    intent,
                    columns,
                }));
            }
            Err(e) => {
                let line = e.position().map_or(0, |p| p.line());
                rows.push(Err(RowParseError {
                    line,
                    message: e.to_string(),
                }));
            }
        }
    }
    Ok(rows)
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| {
            Error::parse(
                1,
                Some(name.to_string()),
                format!("required column {name:?} missing from header row"),
            )
        })
}
