//! Process listing parser
//!
//! Turns the tab-separated text output of a memory-forensics process
//! listing plugin into [`ProcessRecord`]s. The header row may appear
//! anywhere in the file; anything above it (banners, progress lines)
//! is ignored.

use thiserror::Error;

use crate::models::{FieldValue, ProcessRecord};

/// Decoration the listing tool appends to virtual-address columns
const VIRTUAL_MARKER: &str = "(V)";

/// Values the listing tool prints for "no value"
const PLACEHOLDERS: [&str; 2] = ["-", "N/A"];

/// Rows with fewer fields than this are dropped
const MIN_FIELDS: usize = 3;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Could not find header line containing PID and PPID")]
    HeaderNotFound,

    #[error("Error processing file: {0}")]
    Processing(String),
}

#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub records: Vec<ProcessRecord>,
    pub count: usize,
}

/// Output key a header column is stored under
#[derive(Debug, Clone, PartialEq, Eq)]
enum ColumnKey {
    Pid,
    Ppid,
    ImageFileName,
    Offset,
    Threads,
    Handles,
    SessionId,
    Wow64,
    CreateTime,
    ExitTime,
    Audit,
    Cmd,
    Path,
    Other(String),
}

impl ColumnKey {
    fn resolve(header: &str) -> Self {
        match header {
            "PID" | "pid" => ColumnKey::Pid,
            "PPID" | "ppid" => ColumnKey::Ppid,
            "ImageFileName" => ColumnKey::ImageFileName,
            "Offset" => ColumnKey::Offset,
            "Threads" => ColumnKey::Threads,
            "Handles" => ColumnKey::Handles,
            "SessionId" => ColumnKey::SessionId,
            "Wow64" => ColumnKey::Wow64,
            "CreateTime" => ColumnKey::CreateTime,
            "ExitTime" => ColumnKey::ExitTime,
            "Audit" => ColumnKey::Audit,
            "Cmd" => ColumnKey::Cmd,
            "Path" => ColumnKey::Path,
            other => ColumnKey::Other(other.to_string()),
        }
    }
}

/// Ordered column keys taken from the header line
#[derive(Debug, Clone)]
struct HeaderRow {
    columns: Vec<ColumnKey>,
}

impl HeaderRow {
    fn is_header(line: &str) -> bool {
        line.trim().starts_with("PID") && line.contains("PPID")
    }

    fn from_line(line: &str) -> Self {
        let columns = line
            .replace(VIRTUAL_MARKER, "")
            .split('\t')
            .map(ColumnKey::resolve)
            .collect();
        Self { columns }
    }
}

/// Parse an uploaded file, decoding it as UTF-8 first
pub fn parse_listing_bytes(bytes: &[u8]) -> Result<ParseOutcome, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ParseError::Processing(e.to_string()))?;
    parse_listing(text)
}

/// Parse listing text into records
pub fn parse_listing(text: &str) -> Result<ParseOutcome, ParseError> {
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::trim_end)
        .collect();

    let header_idx = lines
        .iter()
        .position(|line| HeaderRow::is_header(line))
        .ok_or(ParseError::HeaderNotFound)?;

    let header = HeaderRow::from_line(lines[header_idx]);
    tracing::debug!("Header found on line {} with {} columns", header_idx + 1, header.columns.len());

    let mut records = Vec::new();
    for (offset, line) in lines[header_idx + 1..].iter().enumerate() {
        match parse_row(&header, line) {
            Some(record) => records.push(record),
            None => tracing::trace!("Skipping row {} after header", offset + 1),
        }
    }

    let count = records.len();
    Ok(ParseOutcome { records, count })
}

fn normalize(value: &str) -> &str {
    if PLACEHOLDERS.contains(&value) {
        ""
    } else {
        value
    }
}

fn parse_row(header: &HeaderRow, line: &str) -> Option<ProcessRecord> {
    let line = line.trim_start_matches(['*', ' ']).trim_end();
    if line.is_empty() {
        return None;
    }

    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() < MIN_FIELDS {
        return None;
    }

    // Integer-coerced columns are held back until the row is complete
    let (mut pid, mut ppid, mut threads) = (None, None, None);
    let mut record = ProcessRecord::new(FieldValue::Int(0));

    for (idx, column) in header.columns.iter().enumerate() {
        let value = normalize(parts.get(idx).copied().unwrap_or(""));
        let text = Some(value.to_string());
        match column {
            ColumnKey::Pid => pid = Some(value),
            ColumnKey::Ppid => ppid = Some(value),
            ColumnKey::Threads => threads = Some(value),
            ColumnKey::ImageFileName => record.image_file_name = text,
            ColumnKey::Offset => record.offset = text,
            ColumnKey::Handles => record.handles = text,
            ColumnKey::SessionId => record.session_id = text,
            ColumnKey::Wow64 => record.wow64 = text,
            ColumnKey::CreateTime => record.create_time = text,
            ColumnKey::ExitTime => record.exit_time = text,
            ColumnKey::Audit => record.audit = text,
            ColumnKey::Cmd => record.cmd = text,
            ColumnKey::Path => record.path = text,
            ColumnKey::Other(name) => {
                record.extra.insert(name.clone(), value.to_string());
            }
        }
    }

    let pid = pid.filter(|p: &&str| !p.trim().is_empty())?;
    record.pid = coerce(pid);
    record.ppid = ppid.map(coerce);
    record.threads = threads.map(coerce);

    Some(record)
}

/// Integer when the text is all ASCII digits, the text itself otherwise.
/// Digits too large for `i64` are kept as text.
fn coerce(value: &str) -> FieldValue {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return FieldValue::Text(value.to_string());
    }

    match value.parse::<i64>() {
        Ok(v) => FieldValue::Int(v),
        Err(e) => {
            tracing::debug!("Keeping {:?} as text: {}", value, e);
            FieldValue::Text(value.to_string())
        }
    }
}
