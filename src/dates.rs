//! Prints the date column of a dataset, one line per non-missing value.

use std::io::Write;
use std::path::Path;

use tracing::{debug, info};

use crate::format::format_date;
use crate::readers::{create_reader, DataReader};
use crate::types::{Result, Row};

/// Writes column 0 of every data row as `DDMONYYYY`, skipping the header row
/// and missing values. Returns the number of lines written.
pub fn write_dates(reader: &mut dyn DataReader, out: &mut dyn Write) -> Result<usize> {
    let rows = reader.read_all()?;
    let mut written = 0;
    for (index, row) in rows.iter().enumerate().skip(1) {
        match row.first() {
            Some(cell) if !cell.is_null() => {
                writeln!(out, "{}", format_date(cell)?)?;
                written += 1;
            }
            _ => debug!(row = index, "missing date skipped"),
        }
    }
    Ok(written)
}

/// Prints the dates of the dataset at `path` to stdout
pub fn print_dates(path: &Path) -> Result<usize> {
    let mut reader = create_reader(path)?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    let written = write_dates(reader.as_mut(), &mut handle)?;
    handle.flush()?;
    info!(path = %path.display(), lines = written, "dates printed");
    Ok(written)
}

/// Reads the whole dataset at `path`, header row first
pub fn parse_sas(path: &Path) -> Result<Vec<Row>> {
    let mut reader = create_reader(path)?;
    reader.read_all()
}
