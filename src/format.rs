//! Rendering of date cells.

use crate::error::Error;
use crate::types::{Result, Value};

/// Day, abbreviated month and four-digit year, e.g. `05JAN2021`
const DATE_PATTERN: &str = "%d%b%Y";

/// Formats a date-like cell as upper-case `DDMONYYYY`.
///
/// Datetimes are formatted by their date part. Every other value is rejected
/// with [`Error::NotADate`].
pub fn format_date(value: &Value) -> Result<String> {
    let date = match value {
        Value::Date(date) => *date,
        Value::DateTime(datetime) => datetime.date(),
        other => return Err(Error::NotADate(format!("{:?}", other))),
    };
    Ok(date.format(DATE_PATTERN).to_string().to_uppercase())
}
