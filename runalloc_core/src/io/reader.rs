//! Read raw tables from CSV files or the first sheet of XLSX workbooks
use std::fs::File;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Reader, Xlsx};
use csv::ReaderBuilder;
use tracing::debug;

use crate::data::table::{RowRecord, OPTIONAL_TABLES, REQUIRED_TABLES};
use crate::data::{InputTables, RawTable};
use crate::io::IoError;

/// Extensions tried, in order, when looking a table up in a directory
const TABLE_EXTENSIONS: [&str; 2] = ["csv", "xlsx"];

/// Read the table at `path`, choosing the format from its extension
pub fn read_table<P: AsRef<Path>>(name: &str, path: P) -> Result<RawTable, IoError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match extension.as_str() {
        "csv" => read_csv(name, path),
        "xlsx" => read_xlsx(name, path),
        _ => Err(IoError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Path of the table `stem` in `dir`, if any file for it exists
pub fn find_table(dir: &Path, stem: &str) -> Option<PathBuf> {
    TABLE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", stem, ext)))
        .find(|path| path.is_file())
}

/// Read every required table, and the optional ones present, from `dir`
pub fn read_tables<P: AsRef<Path>>(dir: P) -> Result<InputTables, IoError> {
    let dir = dir.as_ref();
    let mut tables = InputTables::new();
    for stem in REQUIRED_TABLES {
        let path = find_table(dir, stem).ok_or_else(|| {
            IoError::MissingFile(dir.join(format!("{}.csv", stem)).display().to_string())
        })?;
        tables.insert(read_table(stem, path)?);
    }
    for stem in OPTIONAL_TABLES {
        if let Some(path) = find_table(dir, stem) {
            tables.insert(read_table(stem, path)?);
        }
    }
    Ok(tables)
}

/// Assemble a table from a header and rows of cells, skipping blank rows
fn assemble<I>(name: &str, headers: Vec<String>, rows: I) -> RawTable
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut records = Vec::new();
    for cells in rows {
        let record: RowRecord = headers
            .iter()
            .zip(cells)
            .map(|(header, value)| (header.clone(), value.trim().to_string()))
            .collect();
        if record.values().all(|v| v.is_empty()) {
            continue;
        }
        records.push(record);
    }
    RawTable {
        name: name.to_string(),
        columns: headers,
        rows: records,
    }
}

fn read_csv(name: &str, path: &Path) -> Result<RawTable, IoError> {
    let csv_error = |source| IoError::Csv {
        path: path.display().to_string(),
        source,
    };
    let file = File::open(path).map_err(|e| IoError::Filesystem {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        rows.push(record.iter().map(|v| v.to_string()).collect());
    }
    let table = assemble(name, headers, rows);
    debug!(table = name, path = %path.display(), rows = table.rows.len(), "Read CSV table");
    Ok(table)
}

fn read_xlsx(name: &str, path: &Path) -> Result<RawTable, IoError> {
    let xlsx_error = |message: String| IoError::Xlsx {
        path: path.display().to_string(),
        message,
    };
    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|e: calamine::XlsxError| xlsx_error(e.to_string()))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| xlsx_error("workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| xlsx_error(e.to_string()))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<String>>());
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| xlsx_error("sheet has no header row".to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let table = assemble(name, headers, rows);
    debug!(table = name, path = %path.display(), rows = table.rows.len(), "Read XLSX table");
    Ok(table)
}
