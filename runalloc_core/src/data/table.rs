//! Raw row-record tables, and their conversion into typed rows
use std::str::FromStr;

use indexmap::IndexMap;

use crate::data::error::DataIntegrityError;

pub const DOORS: &str = "doors";
pub const ARTICLES: &str = "articles";
pub const ELIGIBILITY: &str = "eligibility";
pub const SUPPLY: &str = "supply";
pub const HEAT: &str = "heat";
pub const TIER_CAP_RUNS: &str = "tier_cap_runs";
pub const TIER_CAPACITY: &str = "tier_capacity";
pub const MIN_RUNS: &str = "min_runs";

/// Tables every allocation needs
pub const REQUIRED_TABLES: [&str; 7] = [
    DOORS,
    ARTICLES,
    ELIGIBILITY,
    SUPPLY,
    HEAT,
    TIER_CAP_RUNS,
    TIER_CAPACITY,
];

/// Tables an allocation may use when present
pub const OPTIONAL_TABLES: [&str; 1] = [MIN_RUNS];

/// One row of a table, keyed by column name
pub type RowRecord = IndexMap<String, String>;

/// A rectangular table of text cells, as read from a file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Name of the table (see [`REQUIRED_TABLES`] and [`OPTIONAL_TABLES`])
    pub name: String,
    /// Column names, in file order
    pub columns: Vec<String>,
    /// Data rows, header excluded
    pub rows: Vec<RowRecord>,
}

impl RawTable {
    /// Create an empty table with the given columns
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row given as cells in column order
    pub fn push_row(&mut self, cells: &[&str]) {
        let row = self
            .columns
            .iter()
            .zip(cells)
            .map(|(column, cell)| (column.clone(), cell.trim().to_string()))
            .collect();
        self.rows.push(row);
    }

    /// Builder style version of [`RawTable::push_row`]
    pub fn with_row(mut self, cells: &[&str]) -> Self {
        self.push_row(cells);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn require_columns(&self, columns: &[&str]) -> Result<(), DataIntegrityError> {
        match columns.iter().find(|c| !self.columns.iter().any(|have| have == *c)) {
            Some(missing) => Err(DataIntegrityError::MissingColumn {
                table: self.name.clone(),
                column: missing.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Convert every row with `read`, after checking the `columns` it needs are present
    fn read_rows<T>(
        &self,
        columns: &[&str],
        read: impl Fn(&RowReader) -> Result<T, DataIntegrityError>,
    ) -> Result<Vec<T>, DataIntegrityError> {
        self.require_columns(columns)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                read(&RowReader {
                    table: &self.name,
                    row_number: index + 1,
                    row,
                })
            })
            .collect()
    }
}

/// Named collection of the raw tables making up one allocation snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputTables {
    tables: IndexMap<String, RawTable>,
}

impl InputTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, replacing any table with the same name
    pub fn insert(&mut self, table: RawTable) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Builder style version of [`InputTables::insert`]
    pub fn with(mut self, table: RawTable) -> Self {
        self.insert(table);
        self
    }

    pub fn get(&self, name: &str) -> Option<&RawTable> {
        self.tables.get(name)
    }

    /// Look up a table that has to be present
    pub fn required(&self, name: &str) -> Result<&RawTable, DataIntegrityError> {
        self.get(name)
            .ok_or_else(|| DataIntegrityError::MissingTable(name.to_string()))
    }
}

/// Typed access to the cells of one row
struct RowReader<'a> {
    table: &'a str,
    row_number: usize,
    row: &'a RowRecord,
}

impl RowReader<'_> {
    fn cell(&self, column: &str) -> &str {
        self.row.get(column).map(|v| v.trim()).unwrap_or("")
    }

    fn invalid(&self, column: &str) -> DataIntegrityError {
        DataIntegrityError::InvalidField {
            table: self.table.to_string(),
            row: self.row_number,
            column: column.to_string(),
            value: self.cell(column).to_string(),
        }
    }

    /// A non-blank identifier
    fn key(&self, column: &str) -> Result<String, DataIntegrityError> {
        let value = self.cell(column);
        if value.is_empty() {
            return Err(self.invalid(column));
        }
        Ok(value.to_string())
    }

    fn count(&self, column: &str) -> Result<u64, DataIntegrityError> {
        parse_count(self.cell(column)).ok_or_else(|| self.invalid(column))
    }

    fn optional_count(&self, column: &str) -> Result<Option<u64>, DataIntegrityError> {
        if self.cell(column).is_empty() {
            return Ok(None);
        }
        self.count(column).map(Some)
    }

    fn real(&self, column: &str) -> Result<f64, DataIntegrityError> {
        f64::from_str(self.cell(column)).map_err(|_| self.invalid(column))
    }

    fn optional_real(&self, column: &str) -> Result<Option<f64>, DataIntegrityError> {
        if self.cell(column).is_empty() {
            return Ok(None);
        }
        self.real(column).map(Some)
    }

    /// A capacity; blank and positive infinity (`inf`, `infinity`) mean unbounded
    fn capacity(&self, column: &str) -> Result<Option<f64>, DataIntegrityError> {
        let value = self.cell(column);
        if value.is_empty() {
            return Ok(None);
        }
        match f64::from_str(value) {
            Ok(v) if v == f64::INFINITY => Ok(None),
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(self.invalid(column)),
        }
    }

    fn flag(&self, column: &str) -> Result<bool, DataIntegrityError> {
        let value = self.cell(column);
        if value.eq_ignore_ascii_case("true") {
            return Ok(true);
        }
        if value.eq_ignore_ascii_case("false") {
            return Ok(false);
        }
        match f64::from_str(value) {
            Ok(v) if v.is_finite() => Ok(v != 0.0),
            _ => Err(self.invalid(column)),
        }
    }
}

/// Parse a non-negative whole number, accepting spreadsheet style `3.0`
fn parse_count(value: &str) -> Option<u64> {
    if let Ok(v) = u64::from_str(value) {
        return Some(v);
    }
    match f64::from_str(value) {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 => {
            Some(v as u64)
        }
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoorRow {
    pub door: String,
    pub tier: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRow {
    pub sku: String,
    pub size: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EligibilityRow {
    pub door: String,
    pub sku: String,
    pub eligible: bool,
}

/// Supply and ratio share one table, either cell may be blank
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyRow {
    pub sku: String,
    pub size: String,
    pub supply_units: Option<u64>,
    pub ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatRow {
    pub sku: String,
    pub heat: String,
}

/// A blank `max_runs` or `score` cell leaves the pair without that entry
#[derive(Debug, Clone, PartialEq)]
pub struct TierCapRunsRow {
    pub tier: String,
    pub heat: String,
    pub max_runs: Option<u64>,
    pub score: Option<f64>,
}

/// `cap_runs_total` of None means the tier is unbounded
#[derive(Debug, Clone, PartialEq)]
pub struct TierCapacityRow {
    pub tier: String,
    pub cap_runs_total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinRunsRow {
    pub door: String,
    pub sku: String,
    pub min_runs: u64,
}

pub(crate) fn door_rows(table: &RawTable) -> Result<Vec<DoorRow>, DataIntegrityError> {
    table.read_rows(&["door", "tier"], |r| {
        Ok(DoorRow {
            door: r.key("door")?,
            tier: r.key("tier")?,
        })
    })
}

pub(crate) fn article_rows(table: &RawTable) -> Result<Vec<ArticleRow>, DataIntegrityError> {
    table.read_rows(&["sku", "size"], |r| {
        Ok(ArticleRow {
            sku: r.key("sku")?,
            size: r.key("size")?,
        })
    })
}

pub(crate) fn eligibility_rows(
    table: &RawTable,
) -> Result<Vec<EligibilityRow>, DataIntegrityError> {
    table.read_rows(&["door", "sku", "eligible"], |r| {
        Ok(EligibilityRow {
            door: r.key("door")?,
            sku: r.key("sku")?,
            eligible: r.flag("eligible")?,
        })
    })
}

pub(crate) fn supply_rows(table: &RawTable) -> Result<Vec<SupplyRow>, DataIntegrityError> {
    table.read_rows(&["sku", "size", "supply_units", "ratio"], |r| {
        Ok(SupplyRow {
            sku: r.key("sku")?,
            size: r.key("size")?,
            supply_units: r.optional_count("supply_units")?,
            ratio: r.optional_real("ratio")?,
        })
    })
}

pub(crate) fn heat_rows(table: &RawTable) -> Result<Vec<HeatRow>, DataIntegrityError> {
    table.read_rows(&["sku", "heat"], |r| {
        Ok(HeatRow {
            sku: r.key("sku")?,
            heat: r.key("heat")?,
        })
    })
}

pub(crate) fn tier_cap_runs_rows(
    table: &RawTable,
) -> Result<Vec<TierCapRunsRow>, DataIntegrityError> {
    table.read_rows(&["tier", "heat", "max_runs", "score"], |r| {
        Ok(TierCapRunsRow {
            tier: r.key("tier")?,
            heat: r.key("heat")?,
            max_runs: r.optional_count("max_runs")?,
            score: r.optional_real("score")?,
        })
    })
}

pub(crate) fn tier_capacity_rows(
    table: &RawTable,
) -> Result<Vec<TierCapacityRow>, DataIntegrityError> {
    table.read_rows(&["tier", "cap_runs_total"], |r| {
        Ok(TierCapacityRow {
            tier: r.key("tier")?,
            cap_runs_total: r.capacity("cap_runs_total")?,
        })
    })
}

pub(crate) fn min_runs_rows(table: &RawTable) -> Result<Vec<MinRunsRow>, DataIntegrityError> {
    table.read_rows(&["door", "sku", "min_runs"], |r| {
        Ok(MinRunsRow {
            door: r.key("door")?,
            sku: r.key("sku")?,
            min_runs: r.count("min_runs")?,
        })
    })
}
