//! Errors raised while normalizing and validating input tables
use thiserror::Error;

/// A (first, second) business key, such as (sku, size) or (tier, heat)
pub type KeyPair = (String, String);

/// Problems with the input data which the operator has to fix
///
/// Every list of keys is sorted and free of duplicates, so diagnostics are reproducible.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataIntegrityError {
    #[error("Missing required input table: {0}")]
    MissingTable(String),
    #[error("Table {table} is missing required column {column}")]
    MissingColumn { table: String, column: String },
    #[error("Table {table}, row {row}: invalid value {value:?} in column {column}")]
    InvalidField {
        table: String,
        row: usize,
        column: String,
        value: String,
    },
    #[error("Table {0} has no rows")]
    EmptyTable(String),
    #[error("Table {table} has duplicate keys: {keys:?}")]
    DuplicateKeys { table: String, keys: Vec<String> },
    #[error("Missing heat entries for SKUs: {skus:?}")]
    MissingHeat { skus: Vec<String> },
    #[error("Missing supply entries for SKU x size pairs: {pairs:?}")]
    MissingSupply { pairs: Vec<KeyPair> },
    #[error("Missing score entries for tier/heat pairs: {pairs:?}")]
    MissingScore { pairs: Vec<KeyPair> },
    #[error("Missing max_runs entries for tier/heat pairs: {pairs:?}")]
    MissingMaxRuns { pairs: Vec<KeyPair> },
    #[error(
        "Supply and ratio tables must share identical (sku, size) keys; \
         supply without ratio: {supply_without_ratio:?}, ratio without supply: {ratio_without_supply:?}"
    )]
    SupplyRatioMismatch {
        supply_without_ratio: Vec<KeyPair>,
        ratio_without_supply: Vec<KeyPair>,
    },
    #[error("Minimum runs given for unknown door/SKU pairs: {pairs:?}")]
    UnknownMinRunsKeys { pairs: Vec<KeyPair> },
    #[error("Table {table} has negative or non-finite values for keys: {keys:?}")]
    InvalidValues { table: String, keys: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_keys() {
        let err = DataIntegrityError::MissingHeat {
            skus: vec!["sku1".to_string(), "sku2".to_string()],
        };
        assert_eq!(
            err.to_string(),
            r#"Missing heat entries for SKUs: ["sku1", "sku2"]"#
        );

        let err = DataIntegrityError::MissingScore {
            pairs: vec![("B".to_string(), "H".to_string())],
        };
        assert_eq!(
            err.to_string(),
            r#"Missing score entries for tier/heat pairs: [("B", "H")]"#
        );
    }
}
