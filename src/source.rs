//! Tabular source files: CSV and spreadsheet workbooks read into a header row plus cells.

use calamine::{Data, DataType, Reader, open_workbook_auto};
use chrono::NaiveDateTime;
use core::fmt;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Native spreadsheet date/time, wall-clock without zone.
    DateTime(NaiveDateTime),
}

impl Cell {
    fn text(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Label-like rendering used for code and metric columns.
    pub fn as_label(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Int(i) => Some(i.to_string()),
            Cell::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
            Cell::Float(f) if f.is_finite() => Some(f.to_string()),
            Cell::Float(_) => None,
            Cell::Bool(b) => Some(b.to_string()),
            Cell::DateTime(dt) => Some(dt.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug)]
pub enum SourceError {
    Io(std::io::Error),
    Csv(csv::Error),
    Workbook(calamine::Error),
    Unsupported(String),
    NoHeader,
    Pattern(glob::PatternError),
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Io(e) => write!(f, "io error: {}", e),
            SourceError::Csv(e) => write!(f, "csv error: {}", e),
            SourceError::Workbook(e) => write!(f, "workbook error: {}", e),
            SourceError::Unsupported(ext) => write!(f, "unsupported file type: {:?}", ext),
            SourceError::NoHeader => write!(f, "source has no header row"),
            SourceError::Pattern(e) => write!(f, "invalid file pattern: {}", e),
        }
    }
}

impl Error for SourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SourceError::Io(e) => Some(e),
            SourceError::Csv(e) => Some(e),
            SourceError::Workbook(e) => Some(e),
            SourceError::Pattern(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(value: std::io::Error) -> Self {
        SourceError::Io(value)
    }
}

impl From<csv::Error> for SourceError {
    fn from(value: csv::Error) -> Self {
        SourceError::Csv(value)
    }
}

impl From<glob::PatternError> for SourceError {
    fn from(value: glob::PatternError) -> Self {
        SourceError::Pattern(value)
    }
}

impl From<calamine::Error> for SourceError {
    fn from(value: calamine::Error) -> Self {
        SourceError::Workbook(value)
    }
}

/// Read the first sheet (or the whole CSV) of a source file.
pub fn read_table(path: &Path) -> Result<Table, SourceError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "txt" => {
            let bytes = std::fs::read(path)?;
            read_csv(&decode_text(&bytes))
        }
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path),
        other => Err(SourceError::Unsupported(other.to_string())),
    }
}

/// UTF-8 when valid (BOM stripped), Windows-1251 otherwise.
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1251.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Lines looked at when guessing the delimiter.
const SNIFF_LINES: usize = 5;

/// Delimiter with the most occurrences over the first lines. On a tie the earlier
/// candidate wins, so `;` beats the `,` of a decimal or a `, м3` unit suffix.
fn sniff_delimiter(content: &str) -> u8 {
    let sample = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect::<Vec<_>>();
    let mut best = (b',', 0usize);
    for candidate in [b';', b'\t', b','] {
        let count = sample
            .iter()
            .map(|line| line.bytes().filter(|b| *b == candidate).count())
            .sum::<usize>();
        if count > best.1 {
            best = (candidate, count);
        }
    }
    best.0
}

pub fn read_csv(content: &str) -> Result<Table, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(content))
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::text).collect::<Vec<_>>());
    }
    into_table(rows)
}

fn read_workbook(path: &Path) -> Result<Table, SourceError> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet = workbook.sheet_names().first().cloned().ok_or(SourceError::NoHeader)?;
    let range = workbook.worksheet_range(&sheet)?;
    let rows = range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    into_table(rows)
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s),
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(_) => data.as_datetime().map(Cell::DateTime).unwrap_or(Cell::Empty),
    }
}

/// First non-blank row is the header; blank data rows are dropped.
fn into_table(rows: Vec<Vec<Cell>>) -> Result<Table, SourceError> {
    let mut rows = rows.into_iter().filter(|row| row.iter().any(|c| !c.is_empty()));
    let header = rows.next().ok_or(SourceError::NoHeader)?;
    let headers = header
        .iter()
        .map(|c| c.as_label().unwrap_or_default())
        .collect::<Vec<_>>();
    Ok(Table {
        headers,
        rows: rows.collect(),
    })
}
