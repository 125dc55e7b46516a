//! Cell decoding: SAS numbers, missing values and the 1960-based date types.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use encoding_rs::Encoding;
use tracing::warn;

use crate::error::Error;
use crate::types::{Column, ColumnKind, Result, Value};

use super::bytes::{decode_text, Endianness};

/// Day counts outside this range are not read as dates
const MIN_DAYS: f64 = -999_999_999.0;
const MAX_DAYS: f64 = 999_999_999.0;

const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

/// Any second count past this lies far outside `MIN_YEAR..=MAX_YEAR`
const MAX_ABS_SECONDS: f64 = 1.0e13;

/// Format names whose values count days since 1960-01-01
pub const DATE_FORMATS: &[&str] = &[
    "DATE", "DAY", "DDMMYY", "DDMMYYB", "DDMMYYC", "DDMMYYD", "DDMMYYN", "DDMMYYP", "DDMMYYS",
    "JULDAY", "JULIAN", "MMDDYY", "MMDDYYB", "MMDDYYC", "MMDDYYD", "MMDDYYN", "MMDDYYP",
    "MMDDYYS", "MMYY", "MMYYC", "MMYYD", "MMYYN", "MMYYP", "MMYYS", "MONNAME", "MONTH", "MONYY",
    "QTR", "QTRR", "NENGO", "WEEKDATE", "WEEKDATX", "WEEKDAY", "WEEKV", "WORDDATE", "WORDDATX",
    "YEAR", "YYMM", "YYMMC", "YYMMD", "YYMMN", "YYMMP", "YYMMS", "YYMMDD", "YYMMDDB", "YYMMDDC",
    "YYMMDDD", "YYMMDDN", "YYMMDDP", "YYMMDDS", "YYMON", "YYQ", "YYQC", "YYQD", "YYQN", "YYQP",
    "YYQS", "YYQR", "YYQRC", "YYQRD", "YYQRN", "YYQRP", "YYQRS", "E8601DA", "B8601DA",
];

/// Format names whose values count seconds since 1960-01-01 00:00:00
pub const DATETIME_FORMATS: &[&str] = &[
    "DATETIME", "DTWKDATX", "B8601DN", "B8601DT", "B8601DX", "B8601DZ", "B8601LX", "E8601DN",
    "E8601DT", "E8601DX", "E8601DZ", "E8601LX", "DATEAMPM", "DTDATE", "DTMONYY", "DTYEAR", "TOD",
    "MDYAMPM",
];

/// Format names whose values count seconds within a day
pub const TIME_FORMATS: &[&str] = &["TIME", "HHMM"];

/// Picks the value interpretation for a column from its storage type and format name
pub fn column_kind(is_number: bool, format: Option<&str>) -> ColumnKind {
    if !is_number {
        return ColumnKind::Text;
    }
    let Some(format) = format else {
        return ColumnKind::Number;
    };
    let format = format.trim().to_ascii_uppercase();
    if DATE_FORMATS.contains(&format.as_str()) {
        ColumnKind::Date
    } else if DATETIME_FORMATS.contains(&format.as_str()) {
        ColumnKind::Datetime
    } else if TIME_FORMATS.contains(&format.as_str()) {
        ColumnKind::Time
    } else {
        ColumnKind::Number
    }
}

fn sas_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1960, 1, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN)
}

fn in_year_range(year: i32) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&year)
}

/// Converts whole days since 1960-01-01 to a date
pub fn date_from_days(days: f64) -> Option<NaiveDate> {
    if !(MIN_DAYS..=MAX_DAYS).contains(&days) {
        return None;
    }
    sas_epoch()
        .date()
        .checked_add_signed(Duration::days(days as i64))
        .filter(|date| in_year_range(date.year()))
}

/// Converts seconds since 1960-01-01 00:00:00 to a timestamp, keeping fractions
pub fn datetime_from_seconds(seconds: f64) -> Option<NaiveDateTime> {
    if !seconds.is_finite() || seconds.abs() > MAX_ABS_SECONDS {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as i64;
    sas_epoch()
        .checked_add_signed(Duration::seconds(whole as i64))?
        .checked_add_signed(Duration::nanoseconds(nanos))
        .filter(|datetime| in_year_range(datetime.year()))
}

/// Reads a stored number, widening truncated storage to a full double.
///
/// SAS drops the low-order bytes of a double when a column is narrower than 8
/// bytes, so the kept bytes are the most significant ones.
pub fn read_number(raw: &[u8], endianness: Endianness) -> Result<Option<f64>> {
    if raw.is_empty() || raw.len() > 8 {
        return Err(Error::Format(format!(
            "numeric column width {} not supported",
            raw.len()
        )));
    }
    let mut wide = [0u8; 8];
    match endianness {
        Endianness::Little => wide[8 - raw.len()..].copy_from_slice(raw),
        Endianness::Big => wide[..raw.len()].copy_from_slice(raw),
    }
    let value = endianness.read_f64(&wide, 0)?;
    Ok(if value.is_nan() { None } else { Some(value) })
}

/// Decodes one cell of a row
pub fn decode_cell(
    raw: &[u8],
    column: &Column,
    endianness: Endianness,
    encoding: &'static Encoding,
) -> Result<Value> {
    if column.kind == ColumnKind::Text {
        let text = decode_text(raw, encoding);
        return Ok(if text.trim().is_empty() {
            Value::Null
        } else {
            Value::Text(text)
        });
    }

    let Some(number) = read_number(raw, endianness)? else {
        return Ok(Value::Null);
    };

    match column.kind {
        ColumnKind::Date => date_value(number, column),
        ColumnKind::Datetime => datetime_from_seconds(number)
            .map(Value::DateTime)
            .ok_or_else(|| out_of_range(number, column)),
        ColumnKind::Time => datetime_from_seconds(number)
            .map(|datetime| Value::Time(datetime.time()))
            .ok_or_else(|| out_of_range(number, column)),
        _ => Ok(Value::Number(number)),
    }
}

/// Some date-formatted columns actually hold datetimes; a day count that falls
/// outside the date range is reread as seconds and truncated to midnight.
fn date_value(number: f64, column: &Column) -> Result<Value> {
    let days = number.floor();
    if let Some(date) = date_from_days(days) {
        return Ok(Value::Date(date));
    }
    warn!(
        column = %column.name,
        value = number,
        "date value out of range, reading it as a datetime"
    );
    datetime_from_seconds(days)
        .map(|datetime| Value::Date(datetime.date()))
        .ok_or_else(|| out_of_range(number, column))
}

fn out_of_range(number: f64, column: &Column) -> Error {
    Error::Format(format!(
        "value {} in column '{}' is outside the supported {:?} range",
        number, column.name, column.kind
    ))
}
