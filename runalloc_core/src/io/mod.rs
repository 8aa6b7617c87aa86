//! Module for reading input tables and writing reports
pub mod reader;
pub mod writer;

pub use reader::{read_table, read_tables};
pub use writer::write_report;

use thiserror::Error;

/// Errors raised while reading or writing files
#[derive(Error, Debug)]
pub enum IoError {
    #[error("Missing required input table: {0}")]
    MissingFile(String),
    #[error("Unsupported table format for {0}, expected .csv or .xlsx")]
    UnsupportedFormat(String),
    #[error("Unable to read or write CSV file {path}: {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Unable to read spreadsheet {path}: {message}")]
    Xlsx { path: String, message: String },
    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: String,
        source: std::io::Error,
    },
    #[error("Unable to parse {path}: {message}")]
    Deserialize { path: String, message: String },
}
