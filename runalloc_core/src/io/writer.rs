//! Write allocation reports as CSV files
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use serde::Serialize;
use tracing::info;

use crate::allocation::AllocationReport;
use crate::io::IoError;

/// Columns of the allocation report, in output order
pub const ALLOCATION_COLUMNS: [&str; 9] = [
    "door",
    "sku",
    "size",
    "runs",
    "ratio",
    "units",
    "score",
    "heat",
    "door_size_units",
];

/// Columns of the constraint slack report, in output order
pub const SLACK_COLUMNS: [&str; 4] = ["name", "slack", "rhs", "sense"];

/// `<prefix><suffix>`, keeping the prefix's directory
fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(prefix.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

/// Write `rows` to `path` under the given header, which is written even when there are no rows
pub fn write_rows<T: Serialize, P: AsRef<Path>>(
    path: P,
    columns: &[&str],
    rows: &[T],
) -> Result<(), IoError> {
    let path = path.as_ref();
    let csv_error = |source| IoError::Csv {
        path: path.display().to_string(),
        source,
    };
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_error)?;
    writer.write_record(columns).map_err(csv_error)?;
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }
    writer.flush().map_err(|e| IoError::Filesystem {
        path: path.display().to_string(),
        source: e,
    })
}

/// Write `<prefix>_allocations.csv` and `<prefix>_slacks.csv`, creating parent directories
///
/// Returns the allocation and slack report paths.
pub fn write_report<P: AsRef<Path>>(
    report: &AllocationReport,
    prefix: P,
) -> Result<(PathBuf, PathBuf), IoError> {
    let prefix = prefix.as_ref();
    if let Some(parent) = prefix.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| IoError::Filesystem {
            path: parent.display().to_string(),
            source: e,
        })?;
    }
    let allocations_path = with_suffix(prefix, "_allocations.csv");
    let slacks_path = with_suffix(prefix, "_slacks.csv");
    write_rows(&allocations_path, &ALLOCATION_COLUMNS, &report.allocations)?;
    write_rows(&slacks_path, &SLACK_COLUMNS, &report.slacks)?;
    info!(
        allocations = %allocations_path.display(),
        slacks = %slacks_path.display(),
        "Wrote allocation report"
    );
    Ok((allocations_path, slacks_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::{run_allocation, AllocationRow, SlackRow};
    use crate::configuration::Configuration;
    use crate::io::read_tables;
    use crate::optimize::solvers::microlp::MicrolpSolver;
    use crate::optimize::OptimizationStatus;

    fn test_data(dir: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("test_data")
            .join(dir)
    }

    #[test]
    fn empty_report_keeps_headers() {
        let dir = tempfile::tempdir().unwrap();
        let report = AllocationReport {
            status: OptimizationStatus::Optimal,
            objective_value: 0.0,
            allocations: Vec::new(),
            slacks: Vec::new(),
        };
        let (allocations, slacks) =
            write_report(&report, dir.path().join("nested").join("run")).unwrap();
        assert!(allocations.ends_with("nested/run_allocations.csv"));
        assert_eq!(
            fs::read_to_string(allocations).unwrap(),
            "door,sku,size,runs,ratio,units,score,heat,door_size_units\n"
        );
        assert_eq!(fs::read_to_string(slacks).unwrap(), "name,slack,rhs,sense\n");
    }

    #[test]
    fn report_from_csv_inputs() {
        let tables = read_tables(test_data("two_doors")).unwrap();
        let report =
            run_allocation(&tables, &Configuration::default(), &mut MicrolpSolver::new()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let (allocations, slacks) = write_report(&report, dir.path().join("allocation")).unwrap();

        let mut reader = csv::Reader::from_path(&allocations).unwrap();
        let rows: Vec<AllocationRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows, report.allocations);
        assert_eq!(rows[0].runs, 3);
        assert_eq!(rows[1].size, "S");
        assert!((rows[1].units - 6.0).abs() < 1e-9);

        let mut reader = csv::Reader::from_path(&slacks).unwrap();
        let rows: Vec<SlackRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), report.slacks.len());
        assert!(rows.iter().any(|r| r.name == "supply[sku1,M]" && r.sense == "<="));
    }

    #[test]
    fn report_from_xlsx_inputs() {
        let tables = read_tables(test_data("two_doors_xlsx")).unwrap();
        let report =
            run_allocation(&tables, &Configuration::default(), &mut MicrolpSolver::new()).unwrap();
        assert!((report.objective_value - 30.0).abs() < 1e-6);
    }
}
