pub mod sas;

use std::path::Path;

use crate::types::{Column, FileFormat, Result, Row};

/// Common trait for dataset readers
pub trait DataReader {
    /// Column metadata, in row order
    fn columns(&self) -> &[Column];

    /// Next row, starting with the header row of column names
    fn next_row(&mut self) -> Option<Result<Row>>;

    /// Read every remaining row into memory
    fn read_all(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row() {
            rows.push(row?);
        }
        Ok(rows)
    }
}

/// Create a reader for the given file path
pub fn create_reader(path: &Path) -> Result<Box<dyn DataReader>> {
    match FileFormat::from_path(path)? {
        FileFormat::Sas7bdat => Ok(Box::new(sas::SasReader::open(path)?)),
    }
}

/// True for a regular file with the dataset extension
pub fn is_sas_file(path: &Path) -> bool {
    path.is_file() && FileFormat::from_path(path).is_ok()
}

/// True when `dir` directly contains at least one dataset
pub fn is_sas_directory(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .any(|entry| is_sas_file(&entry.path()))
        })
        .unwrap_or(false)
}
