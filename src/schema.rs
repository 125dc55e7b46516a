use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::readers::sas::decompress::Compression;
use crate::readers::sas::header::SasHeader;
use crate::readers::sas::SasReader;
use crate::readers::DataReader;
use crate::types::{Column, FileFormat, Result};

/// Dataset description written by the `schema` command
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSchema {
    /// Schema version
    pub version: String,

    /// File name (without path)
    pub file_name: String,

    /// File format
    pub format: FileFormat,

    /// Decoded file header
    pub header: SasHeader,

    /// Row compression
    pub compression: Compression,

    /// Number of data rows the file declares
    pub row_count: usize,

    /// Columns in row order
    pub columns: Vec<Column>,
}

/// Extract header and column metadata without decoding any rows
pub fn extract_schema(path: &Path) -> Result<DatasetSchema> {
    let format = FileFormat::from_path(path)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    let reader = SasReader::open(path)?;
    let schema = DatasetSchema {
        version: "1.0.0".to_string(),
        file_name,
        format,
        header: reader.header().clone(),
        compression: reader.compression(),
        row_count: reader.row_count(),
        columns: reader.columns().to_vec(),
    };
    info!(
        file = %schema.file_name,
        columns = schema.columns.len(),
        rows = schema.row_count,
        "schema extracted"
    );
    Ok(schema)
}
