//! Translate validated allocation data into an integer program
use tracing::debug;

use crate::allocation::model::AllocationModel;
use crate::data::AllocationData;
use crate::error::AllocationError;
use crate::optimize::constraint::Constraint;
use crate::optimize::problem::Problem;
use crate::optimize::variable::Variable;

/// Id of the `runs` variable of a door and SKU
pub fn runs_variable_id(door: &str, sku: &str) -> String {
    format!("runs[{},{}]", door, sku)
}

pub fn eligibility_constraint_id(door: &str, sku: &str) -> String {
    format!("eligibility[{},{}]", door, sku)
}

pub fn min_runs_constraint_id(door: &str, sku: &str) -> String {
    format!("min_runs[{},{}]", door, sku)
}

pub fn supply_constraint_id(sku: &str, size: &str) -> String {
    format!("supply[{},{}]", sku, size)
}

pub fn cap_runs_total_constraint_id(door: &str) -> String {
    format!("cap_runs_total[{}]", door)
}

fn lookup_miss(what: &str, key: &str) -> AllocationError {
    AllocationError::InternalConsistency(format!("no {} for {} in validated data", what, key))
}

pub(crate) fn tier_of<'d>(data: &'d AllocationData, door: &str) -> Result<&'d str, AllocationError> {
    data.tier(door).ok_or_else(|| lookup_miss("tier", door))
}

pub(crate) fn heat_of<'d>(data: &'d AllocationData, sku: &str) -> Result<&'d str, AllocationError> {
    data.heat(sku).ok_or_else(|| lookup_miss("heat", sku))
}

pub(crate) fn score_of(data: &AllocationData, tier: &str, heat: &str) -> Result<f64, AllocationError> {
    data.score(tier, heat)
        .ok_or_else(|| lookup_miss("score", &format!("({}, {})", tier, heat)))
}

/// Build the full run allocation program
///
/// The program has one non-negative integer `runs[door,sku]` variable for every door
/// and SKU, eligible or not, and maximizes the total tier/heat score of shipped runs
/// subject to:
///
/// 1. `eligibility[door,sku]`: `runs <= eligible * max_runs(tier, heat)`
/// 2. `min_runs[door,sku]`: `runs >= min_runs`, only for positive minimums
/// 3. `supply[sku,size]`: `sum over doors of ratio * runs <= supply_units`
/// 4. `cap_runs_total[door]`: `sum over SKUs of runs <= cap_runs_total(tier)`, only
///    for tiers with a finite capacity
///
/// # Examples
/// ```rust
/// use runalloc_core::allocation::build_allocation_model;
/// use runalloc_core::data::{AllocationData, InputTables, RawTable};
///
/// let tables = InputTables::new()
///     .with(RawTable::new("doors", &["door", "tier"]).with_row(&["d1", "A"]))
///     .with(RawTable::new("articles", &["sku", "size"]).with_row(&["s1", "M"]))
///     .with(RawTable::new("eligibility", &["door", "sku", "eligible"]).with_row(&["d1", "s1", "1"]))
///     .with(RawTable::new("supply", &["sku", "size", "supply_units", "ratio"]).with_row(&["s1", "M", "4", "1"]))
///     .with(RawTable::new("heat", &["sku", "heat"]).with_row(&["s1", "H"]))
///     .with(RawTable::new("tier_cap_runs", &["tier", "heat", "max_runs", "score"]).with_row(&["A", "H", "2", "1"]))
///     .with(RawTable::new("tier_capacity", &["tier", "cap_runs_total"]));
/// let data = AllocationData::from_tables(&tables).unwrap();
/// let model = build_allocation_model(&data, "example").unwrap();
/// assert_eq!(model.problem().num_variables(), 1);
/// // Eligibility and supply, no capacity for tier A
/// assert_eq!(model.problem().num_constraints(), 2);
/// ```
pub fn build_allocation_model<'a>(
    data: &'a AllocationData,
    model_name: &str,
) -> Result<AllocationModel<'a>, AllocationError> {
    let mut problem = Problem::new_maximization();

    for door in data.doors() {
        for sku in data.skus() {
            problem.add_variable(Variable::new_non_negative_integer(&runs_variable_id(
                door, sku,
            )))?;
        }
    }

    for door in data.doors() {
        let tier = tier_of(data, door)?;
        for sku in data.skus() {
            let heat = heat_of(data, sku)?;
            let score = score_of(data, tier, heat)?;
            problem.add_new_linear_objective_term_by_id(&runs_variable_id(door, sku), score)?;
        }
    }

    for door in data.doors() {
        let tier = tier_of(data, door)?;
        for sku in data.skus() {
            let heat = heat_of(data, sku)?;
            let max_runs = data.max_runs(tier, heat).ok_or_else(|| {
                lookup_miss("max runs", &format!("({}, {})", tier, heat))
            })?;
            let cap = if data.is_eligible(door, sku) {
                max_runs as f64
            } else {
                0.0
            };
            let runs = runs_variable_id(door, sku);
            problem.add_constraint(Constraint::new_less_equal(
                &eligibility_constraint_id(door, sku),
                &[runs.as_str()],
                &[1.0],
                cap,
            ))?;
            let min_runs = data.min_runs(door, sku);
            if min_runs > 0 {
                problem.add_constraint(Constraint::new_greater_equal(
                    &min_runs_constraint_id(door, sku),
                    &[runs.as_str()],
                    &[1.0],
                    min_runs as f64,
                ))?;
            }
        }
    }

    let door_runs: Vec<Vec<String>> = data
        .skus()
        .iter()
        .map(|sku| {
            data.doors()
                .iter()
                .map(|door| runs_variable_id(door, sku))
                .collect()
        })
        .collect();
    for (sku, size) in data.supply_keys() {
        let supply = data
            .supply_units(sku, size)
            .ok_or_else(|| lookup_miss("supply", &format!("({}, {})", sku, size)))?;
        let ratio = data
            .ratio(sku, size)
            .ok_or_else(|| lookup_miss("ratio", &format!("({}, {})", sku, size)))?;
        let sku_index = data
            .skus()
            .iter()
            .position(|s| s == sku)
            .ok_or_else(|| lookup_miss("SKU", sku))?;
        let variables: Vec<&str> = door_runs[sku_index].iter().map(String::as_str).collect();
        let coefficients = vec![ratio; variables.len()];
        problem.add_constraint(Constraint::new_less_equal(
            &supply_constraint_id(sku, size),
            &variables,
            &coefficients,
            supply as f64,
        ))?;
    }

    for door in data.doors() {
        let tier = tier_of(data, door)?;
        let Some(cap) = data.cap_runs_total(tier) else {
            continue;
        };
        let runs: Vec<String> = data
            .skus()
            .iter()
            .map(|sku| runs_variable_id(door, sku))
            .collect();
        let variables: Vec<&str> = runs.iter().map(String::as_str).collect();
        let coefficients = vec![1.0; variables.len()];
        problem.add_constraint(Constraint::new_less_equal(
            &cap_runs_total_constraint_id(door),
            &variables,
            &coefficients,
            cap,
        ))?;
    }

    debug!(
        model = model_name,
        variables = problem.num_variables(),
        constraints = problem.num_constraints(),
        "Built allocation model"
    );
    Ok(AllocationModel::new(model_name, problem, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::allocation_data::tests::two_door_tables;
    use crate::data::table::{RawTable, MIN_RUNS};
    use crate::optimize::constraint::ConstraintSense;
    use crate::optimize::objective::ObjectiveSense;

    #[test]
    fn dense_variable_grid() {
        let data = AllocationData::from_tables(&two_door_tables()).unwrap();
        let model = build_allocation_model(&data, "test").unwrap();
        let problem = model.problem();
        assert_eq!(problem.num_variables(), 2);
        assert!(problem.variables().contains_key("runs[door2,sku1]"));
        assert_eq!(problem.objective().sense(), ObjectiveSense::Maximize);
        let coefficients: Vec<f64> = problem
            .objective()
            .terms()
            .iter()
            .map(|t| t.coefficient)
            .collect();
        assert_eq!(coefficients, vec![10.0, 5.0]);
    }

    #[test]
    fn constraint_names_and_bounds() {
        let data = AllocationData::from_tables(&two_door_tables()).unwrap();
        let model = build_allocation_model(&data, "test").unwrap();
        let names: Vec<&str> = model
            .problem()
            .constraints()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(
            names,
            vec![
                "eligibility[door1,sku1]",
                "eligibility[door2,sku1]",
                "supply[sku1,M]",
                "supply[sku1,S]",
                "cap_runs_total[door1]",
            ]
        );
        let constraints = model.problem().constraints();
        assert_eq!(constraints["eligibility[door1,sku1]"].rhs, 3.0);
        assert_eq!(constraints["eligibility[door2,sku1]"].rhs, 0.0);
        let supply = &constraints["supply[sku1,M]"];
        assert_eq!(supply.rhs, 9.0);
        assert_eq!(supply.terms.len(), 2);
        assert!(supply.terms.iter().all(|t| t.coefficient == 3.0));
    }

    #[test]
    fn positive_minimums_only() {
        let tables = two_door_tables().with(
            RawTable::new(MIN_RUNS, &["door", "sku", "min_runs"])
                .with_row(&["door1", "sku1", "2"])
                .with_row(&["door2", "sku1", "0"]),
        );
        let data = AllocationData::from_tables(&tables).unwrap();
        let model = build_allocation_model(&data, "test").unwrap();
        let constraints = model.problem().constraints();
        let minimum = &constraints["min_runs[door1,sku1]"];
        assert_eq!(minimum.sense, ConstraintSense::GreaterEqual);
        assert_eq!(minimum.rhs, 2.0);
        assert!(!constraints.contains_key("min_runs[door2,sku1]"));
    }
}
