//! Tabular parser
//!
//! Turns a CSV file or an Excel workbook into a list of rows keyed by
//! normalized column name. No semantic validation happens here.

use calamine::{open_workbook_auto, Data, DataType, Reader};
use std::collections::HashMap;
use std::path::Path;

/// One input row: normalized header name to raw cell text.
pub type RawRow = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    Csv,
    Spreadsheet,
}

impl TabularFormat {
    /// Picks the format from the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self, ParseError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(TabularFormat::Csv),
            "xlsx" | "xls" => Ok(TabularFormat::Spreadsheet),
            "" => Err(ParseError::UnsupportedFormat(
                "file has no extension".to_string(),
            )),
            other => Err(ParseError::UnsupportedFormat(format!(".{}", other))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },
}

/// Reads every row of `path`. Blocking; call from `spawn_blocking`.
///
/// Workbooks are read sheet by sheet and concatenated in sheet order, each
/// sheet's first non-empty row serving as its header.
pub fn parse_file(path: &Path) -> Result<Vec<RawRow>, ParseError> {
    match TabularFormat::from_path(path)? {
        TabularFormat::Csv => parse_csv(path),
        TabularFormat::Spreadsheet => parse_spreadsheet(path),
    }
}

/// Lowercases, trims and snake-cases a header so `First Name` and
/// `first_name` address the same column.
pub fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

fn parse_csv(path: &Path) -> Result<Vec<RawRow>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| ParseError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| read_error(path, e))?
        .iter()
        .map(normalize_header)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| read_error(path, e))?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        rows.push(zip_row(&headers, record.iter()));
    }

    tracing::debug!(path = %path.display(), rows = rows.len(), "CSV parsed");
    Ok(rows)
}

fn parse_spreadsheet(path: &Path) -> Result<Vec<RawRow>, ParseError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| ParseError::Open {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let sheet_names = workbook.sheet_names().to_owned();
    let mut rows = Vec::new();

    for sheet in &sheet_names {
        let range = workbook
            .worksheet_range(sheet)
            .map_err(|e| read_error(path, e))?;

        let mut sheet_rows = range
            .rows()
            .map(|cells| cells.iter().map(cell_text).collect::<Vec<_>>())
            .filter(|cells| cells.iter().any(|c| !c.is_empty()));

        let Some(header_cells) = sheet_rows.next() else {
            tracing::debug!(sheet = %sheet, "Skipping empty sheet");
            continue;
        };
        let headers: Vec<String> = header_cells.iter().map(|h| normalize_header(h)).collect();

        let before = rows.len();
        for cells in sheet_rows {
            rows.push(zip_row(&headers, cells.iter().map(String::as_str)));
        }
        tracing::debug!(sheet = %sheet, rows = rows.len() - before, "Sheet parsed");
    }

    Ok(rows)
}

fn zip_row<'a>(headers: &[String], fields: impl Iterator<Item = &'a str>) -> RawRow {
    headers
        .iter()
        .zip(fields)
        .filter(|(header, _)| !header.is_empty())
        .map(|(header, value)| (header.clone(), value.to_string()))
        .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::DateTime(_) => cell
            .as_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| cell.to_string()),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn read_error(path: &Path, err: impl std::fmt::Display) -> ParseError {
    ParseError::Read {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
