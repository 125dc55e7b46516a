//! Reads SAS7BDAT datasets and prints their date column as `DDMONYYYY`.

pub mod cli;
pub mod dates;
pub mod error;
pub mod format;
pub mod output;
pub mod readers;
pub mod schema;
pub mod types;

pub use dates::{parse_sas, print_dates, write_dates};
pub use error::Error;
pub use format::format_date;
pub use readers::{create_reader, is_sas_directory, is_sas_file, DataReader};
pub use types::{Result, Row, Value};
