//! Full run allocation: build the program, solve it, and report the result
pub mod builder;
pub mod model;
pub mod report;

pub use builder::build_allocation_model;
pub use model::AllocationModel;
pub use report::{AllocationRow, SlackRow};

use tracing::info;

use crate::configuration::Configuration;
use crate::data::{AllocationData, InputTables};
use crate::error::AllocationError;
use crate::optimize::solvers::Solver;
use crate::optimize::OptimizationStatus;

/// Result of a successful allocation run
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationReport {
    pub status: OptimizationStatus,
    pub objective_value: f64,
    pub allocations: Vec<AllocationRow>,
    pub slacks: Vec<SlackRow>,
}

/// Validate `tables`, build and solve the allocation program with `solver`, and
/// read back the allocation and slack rows
pub fn run_allocation(
    tables: &InputTables,
    configuration: &Configuration,
    solver: &mut dyn Solver,
) -> Result<AllocationReport, AllocationError> {
    let data = AllocationData::from_tables(tables)?;
    let mut model = build_allocation_model(&data, &configuration.model_name)?;
    let status = model.solve(solver, &configuration.solver_parameters())?;
    let objective_value = model.objective_value()?;
    let allocations = model.summarize_allocations(configuration.tolerance)?;
    let slacks = model.constraint_slacks()?;
    info!(
        status = %status,
        objective = objective_value,
        allocation_rows = allocations.len(),
        slack_rows = slacks.len(),
        "Allocation complete"
    );
    Ok(AllocationReport {
        status,
        objective_value,
        allocations,
        slacks,
    })
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::configuration::ConfigurationBuilder;
    use crate::data::allocation_data::tests::two_door_tables;
    use crate::data::table::*;
    use crate::optimize::solvers::microlp::MicrolpSolver;

    fn solve(tables: &InputTables) -> Result<AllocationReport, AllocationError> {
        run_allocation(tables, &Configuration::default(), &mut MicrolpSolver::new())
    }

    #[test]
    fn two_door_scenario() {
        let report = solve(&two_door_tables()).unwrap();
        assert_eq!(report.status, OptimizationStatus::Optimal);
        assert!((report.objective_value - 30.0).abs() < 1e-6);
        assert!(report.allocations.iter().all(|r| r.door == "door1"));
        let units: Vec<(&str, f64)> = report
            .allocations
            .iter()
            .map(|r| (r.size.as_str(), r.units))
            .collect();
        assert_eq!(units, vec![("M", 9.0), ("S", 6.0)]);
        assert!(report
            .slacks
            .iter()
            .any(|s| s.name == "cap_runs_total[door1]" && s.slack.abs() < 1e-6));
        assert!(!report.slacks.iter().any(|s| s.name == "cap_runs_total[door2]"));
    }

    #[test]
    fn unsupported_parameters_do_not_fail_the_run() {
        let configuration = ConfigurationBuilder::default()
            .use_solution_pool(true)
            .time_limit(Some(60.0))
            .build()
            .unwrap();
        let report =
            run_allocation(&two_door_tables(), &configuration, &mut MicrolpSolver::new()).unwrap();
        assert!((report.objective_value - 30.0).abs() < 1e-6);
    }

    #[test]
    fn infeasible_minimum_runs() {
        // door1 can take at most 3 runs, a minimum of 4 conflicts with its cap
        let tables = two_door_tables().with(
            RawTable::new(MIN_RUNS, &["door", "sku", "min_runs"]).with_row(&["door1", "sku1", "4"]),
        );
        assert_eq!(
            solve(&tables),
            Err(AllocationError::SolveFailed(OptimizationStatus::Infeasible))
        );
    }

    #[test]
    fn data_errors_stop_before_solving() {
        let tables = two_door_tables().with(
            RawTable::new(TIER_CAP_RUNS, &["tier", "heat", "max_runs", "score"])
                .with_row(&["A", "H", "3", "10"]),
        );
        assert!(matches!(
            solve(&tables),
            Err(AllocationError::DataIntegrity(_))
        ));
    }

    /// Four doors across three tiers, three SKUs with differing run curves
    fn store_network_tables() -> InputTables {
        InputTables::new()
            .with(
                RawTable::new(DOORS, &["door", "tier"])
                    .with_row(&["d1", "A"])
                    .with_row(&["d2", "A"])
                    .with_row(&["d3", "B"])
                    .with_row(&["d4", "C"]),
            )
            .with(
                RawTable::new(ARTICLES, &["sku", "size"])
                    .with_row(&["jacket", "S"])
                    .with_row(&["jacket", "M"])
                    .with_row(&["jacket", "L"])
                    .with_row(&["shoe", "42"])
                    .with_row(&["shoe", "43"])
                    .with_row(&["tee", "M"]),
            )
            .with(
                RawTable::new(ELIGIBILITY, &["door", "sku", "eligible"])
                    .with_row(&["d1", "jacket", "1"])
                    .with_row(&["d1", "shoe", "1"])
                    .with_row(&["d1", "tee", "1"])
                    .with_row(&["d2", "jacket", "1"])
                    .with_row(&["d2", "shoe", "0"])
                    .with_row(&["d2", "tee", "1"])
                    .with_row(&["d3", "jacket", "1"])
                    .with_row(&["d3", "shoe", "1"])
                    .with_row(&["d4", "tee", "1"]),
            )
            .with(
                RawTable::new(SUPPLY, &["sku", "size", "supply_units", "ratio"])
                    .with_row(&["jacket", "S", "10", "1"])
                    .with_row(&["jacket", "M", "14", "2"])
                    .with_row(&["jacket", "L", "9", "1"])
                    .with_row(&["shoe", "42", "8", "2"])
                    .with_row(&["shoe", "43", "6", "1"])
                    .with_row(&["tee", "M", "7", "1"]),
            )
            .with(
                RawTable::new(HEAT, &["sku", "heat"])
                    .with_row(&["jacket", "hot"])
                    .with_row(&["shoe", "warm"])
                    .with_row(&["tee", "warm"]),
            )
            .with(
                RawTable::new(TIER_CAP_RUNS, &["tier", "heat", "max_runs", "score"])
                    .with_row(&["A", "hot", "4", "10"])
                    .with_row(&["A", "warm", "3", "6"])
                    .with_row(&["B", "hot", "3", "7"])
                    .with_row(&["B", "warm", "2", "4"])
                    .with_row(&["C", "hot", "2", "3"])
                    .with_row(&["C", "warm", "5", "2"]),
            )
            .with(
                RawTable::new(TIER_CAPACITY, &["tier", "cap_runs_total"])
                    .with_row(&["A", "6"])
                    .with_row(&["B", "4"])
                    .with_row(&["C", "inf"]),
            )
    }

    #[test]
    fn solution_respects_business_rules() {
        let tables = store_network_tables();
        let data = AllocationData::from_tables(&tables).unwrap();
        let report = solve(&tables).unwrap();

        let mut runs: IndexMap<(String, String), u64> = IndexMap::new();
        for row in &report.allocations {
            runs.insert((row.door.clone(), row.sku.clone()), row.runs);
        }
        let runs_of = |door: &str, sku: &str| {
            runs.get(&(door.to_string(), sku.to_string()))
                .copied()
                .unwrap_or(0)
        };

        for door in data.doors() {
            let tier = data.tier(door).unwrap();
            for sku in data.skus() {
                let r = runs_of(door, sku);
                if !data.is_eligible(door, sku) {
                    assert_eq!(r, 0, "{door} received ineligible {sku}");
                }
                let cap = data.max_runs(tier, data.heat(sku).unwrap()).unwrap();
                assert!(r <= cap);
            }
            let total: u64 = data.skus().iter().map(|sku| runs_of(door, sku)).sum();
            if let Some(cap) = data.cap_runs_total(tier) {
                assert!(total as f64 <= cap + 1e-6);
            }
        }
        for (sku, size) in data.supply_keys() {
            let ratio = data.ratio(sku, size).unwrap();
            let shipped: f64 = data
                .doors()
                .iter()
                .map(|door| ratio * runs_of(door, sku) as f64)
                .sum();
            assert!(shipped <= data.supply_units(sku, size).unwrap() as f64 + 1e-6);
        }

        // Objective agrees with the reported runs
        let objective: f64 = report
            .allocations
            .iter()
            .filter(|r| data.sku_sizes(&r.sku).unwrap()[0] == r.size)
            .map(|r| r.score * r.runs as f64)
            .sum();
        assert!((objective - report.objective_value).abs() < 1e-6);
    }

    #[test]
    fn store_network_reaches_optimum() {
        // Seven jackets split 5/2 between the A doors and d3, shoes and tees fill the rest
        let report = solve(&store_network_tables()).unwrap();
        assert_eq!(report.status, OptimizationStatus::Optimal);
        assert!((report.objective_value - 118.0).abs() < 1e-6);
        let jackets: u64 = report
            .allocations
            .iter()
            .filter(|r| r.sku == "jacket" && r.size == "S")
            .map(|r| r.runs)
            .sum();
        assert_eq!(jackets, 7);
    }

    #[test]
    fn door_size_units_recompute() {
        let report = solve(&store_network_tables()).unwrap();
        let mut totals: IndexMap<(String, String), f64> = IndexMap::new();
        for row in &report.allocations {
            *totals
                .entry((row.door.clone(), row.size.clone()))
                .or_insert(0.0) += row.units;
        }
        for row in &report.allocations {
            assert_eq!(
                totals[&(row.door.clone(), row.size.clone())],
                row.door_size_units
            );
        }
    }

    #[test]
    fn rows_in_canonical_order() {
        let report = solve(&store_network_tables()).unwrap();
        let keys: Vec<(&str, &str, &str)> = report
            .allocations
            .iter()
            .map(|r| (r.door.as_str(), r.sku.as_str(), r.size.as_str()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
