use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Dataset read when no input path is given
pub const DEFAULT_INPUT: &str = "date_dd_mm_yyyy.sas7bdat";

/// File extension of SAS datasets
pub const SAS_EXTENSION: &str = "sas7bdat";

/// A single cell of a row
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value (SAS `.` for numbers, blanks for text)
    Null,
    Number(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// One record, cells ordered by column index
pub type Row = Vec<Value>;

/// How the bytes of a column are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Number,
    Text,
    Date,
    Datetime,
    Time,
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column index (0-based)
    pub index: usize,

    /// Column name
    pub name: String,

    /// Column label, if one was stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// SAS format name (e.g. `DATE`, `DATETIME`), if one was stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Value interpretation
    pub kind: ColumnKind,

    /// Byte offset of the column within a row
    pub offset: usize,

    /// Width of the column in bytes
    pub length: usize,
}

impl Column {
    pub fn new(index: usize, name: String, kind: ColumnKind) -> Self {
        Self {
            index,
            name,
            label: None,
            format: None,
            kind,
            offset: 0,
            length: 0,
        }
    }
}

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Sas7bdat,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case(SAS_EXTENSION) {
            Some(FileFormat::Sas7bdat)
        } else {
            None
        }
    }

    /// Format of the file at `path`, judged by its extension alone
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Self::from_extension(ext).ok_or_else(|| {
            crate::error::Error::UnsupportedFormat(format!("Unsupported file extension: .{}", ext))
        })
    }
}

/// Result type for the application
pub type Result<T> = std::result::Result<T, crate::error::Error>;
