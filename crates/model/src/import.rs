use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// Full or update CIF schedule extract (`BS`/`BX`/`LO`/`LI`/`LT` records).
    Cif,
    /// Master Station Names file.
    Msn,
    /// Additional Line Fix / flow-connection file, either key=value or
    /// legacy fixed-width layout.
    Alf,
}

/// One line a format adapter could not parse. Skipped and counted, never
/// fatal to the rest of the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseError {
    pub line_number: u64,
    pub reason: String,
}

/// Returned by every format adapter alongside its lazy sequence of records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseReport {
    pub record_count: u64,
    pub parse_errors: Vec<ParseError>,
}

impl ParseReport {
    pub fn record_ok(&mut self) {
        self.record_count += 1;
    }

    pub fn record_error(&mut self, line_number: u64, reason: impl Into<String>) {
        self.record_count += 1;
        self.parse_errors.push(ParseError {
            line_number,
            reason: reason.into(),
        });
    }
}

/// Outcome of `Schedule Store::begin_import`'s content-hash dedup check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportOutcome {
    Accept,
    Duplicate,
    Replace,
}

/// Schedule-store housekeeping record for one import batch. A file with an
/// already-recorded `file_hash` and `success=true` is not re-imported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRecord {
    pub file_type: FileType,
    pub file_hash: String,
    pub sequence_number: i64,
    pub record_count: u64,
    pub records_imported: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub success: bool,
    pub errors: Vec<String>,
}
