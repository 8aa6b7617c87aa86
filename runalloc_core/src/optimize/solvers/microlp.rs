//! Solver interface for the microlp solver
//!
//! microlp builds its problem with a fixed objective direction, so everything added
//! through the [`Solver`] trait is buffered and only handed to microlp on `solve`.
use ::microlp::{ComparisonOp, OptimizationDirection};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::optimize::objective::ObjectiveSense;
use crate::optimize::solvers::{
    ParameterValue, Solver, SolverError, POOL_SEARCH_MODE, POOL_SOLUTIONS, TIME_LIMIT,
};
use crate::optimize::variable::VariableType;
use crate::optimize::{OptimizationStatus, ProblemSolution};

#[derive(Clone, Debug)]
struct BufferedVariable {
    variable_type: VariableType,
    lower_bound: f64,
    upper_bound: f64,
    objective_coefficient: f64,
}

#[derive(Clone, Debug)]
struct BufferedRow {
    id: String,
    /// Terms keyed by variable position, microlp rejects repeated variables in one row
    terms: IndexMap<usize, f64>,
    comparison: Comparison,
    rhs: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Comparison {
    Le,
    Ge,
    Eq,
}

impl From<Comparison> for ComparisonOp {
    fn from(c: Comparison) -> Self {
        match c {
            Comparison::Le => ComparisonOp::Le,
            Comparison::Ge => ComparisonOp::Ge,
            Comparison::Eq => ComparisonOp::Eq,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MicrolpSolver {
    variables: IndexMap<String, BufferedVariable>,
    rows: Vec<BufferedRow>,
    sense: ObjectiveSense,
}

impl MicrolpSolver {
    pub fn new() -> Self {
        Self {
            variables: IndexMap::new(),
            rows: Vec::new(),
            sense: ObjectiveSense::Maximize,
        }
    }

    fn add_variable(
        &mut self,
        id: &str,
        variable_type: VariableType,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), SolverError> {
        if self.variables.contains_key(id) {
            return Err(SolverError::DuplicateVariable(id.to_string()));
        }
        self.variables.insert(
            id.to_string(),
            BufferedVariable {
                variable_type,
                lower_bound,
                upper_bound,
                objective_coefficient: 0.0,
            },
        );
        Ok(())
    }

    fn add_row(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        comparison: Comparison,
        rhs: f64,
    ) -> Result<(), SolverError> {
        let mut terms: IndexMap<usize, f64> = IndexMap::new();
        for (var, coef) in variables.iter().zip(coefficients) {
            let position = self
                .variables
                .get_index_of(*var)
                .ok_or_else(|| SolverError::UnknownVariable(var.to_string()))?;
            *terms.entry(position).or_insert(0.0) += *coef;
        }
        self.rows.push(BufferedRow {
            id: id.to_string(),
            terms,
            comparison,
            rhs,
        });
        Ok(())
    }

    /// Upper bounds implied by `<=` and `=` rows whose terms are all positive over
    /// variables bounded below by zero
    ///
    /// microlp's branch and bound is only exact on finite integer bounds, so every
    /// integer column is tightened this way before it is handed over.
    fn implied_upper_bounds(&self) -> Vec<f64> {
        let mut bounds: Vec<f64> = self.variables.values().map(|v| v.upper_bound).collect();
        for row in &self.rows {
            if row.comparison == Comparison::Ge || row.terms.is_empty() {
                continue;
            }
            let bounding = row.terms.iter().all(|(position, coef)| {
                *coef > 0.0
                    && self
                        .variables
                        .get_index(*position)
                        .is_some_and(|(_, var)| var.lower_bound >= 0.0)
            });
            if !bounding {
                continue;
            }
            for (position, coef) in &row.terms {
                let implied = row.rhs / coef;
                if implied < bounds[*position] {
                    bounds[*position] = implied;
                }
            }
        }
        bounds
    }

    /// A row without terms can't be handed to microlp, check it directly instead
    fn empty_row_violated(row: &BufferedRow) -> bool {
        match row.comparison {
            Comparison::Le => row.rhs < 0.0,
            Comparison::Ge => row.rhs > 0.0,
            Comparison::Eq => row.rhs != 0.0,
        }
    }
}

impl Default for MicrolpSolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Largest integer at or below an implied bound, never below the lower bound
fn integer_upper_bound(lower_bound: f64, implied: f64) -> f64 {
    if implied.is_finite() {
        (implied + 1e-9).floor().max(lower_bound)
    } else {
        implied
    }
}

/// microlp takes integer bounds as i32, infinite bounds saturate
fn integer_bound(bound: f64) -> i32 {
    if bound >= i32::MAX as f64 {
        i32::MAX
    } else if bound <= i32::MIN as f64 {
        i32::MIN
    } else {
        bound.round() as i32
    }
}

impl Solver for MicrolpSolver {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn integer_variable_capable(&self) -> bool {
        true
    }

    fn add_continuous_variable(
        &mut self,
        id: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), SolverError> {
        self.add_variable(id, VariableType::Continuous, lower_bound, upper_bound)
    }

    fn add_integer_variable(
        &mut self,
        id: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), SolverError> {
        self.add_variable(id, VariableType::Integer, lower_bound, upper_bound)
    }

    fn add_equality_constraint(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        equals: f64,
    ) -> Result<(), SolverError> {
        self.add_row(id, variables, coefficients, Comparison::Eq, equals)
    }

    fn add_inequality_constraint(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), SolverError> {
        if lower_bound == upper_bound {
            return self.add_row(id, variables, coefficients, Comparison::Eq, upper_bound);
        }
        if lower_bound.is_finite() {
            self.add_row(id, variables, coefficients, Comparison::Ge, lower_bound)?;
        }
        if upper_bound.is_finite() {
            self.add_row(id, variables, coefficients, Comparison::Le, upper_bound)?;
        }
        if !lower_bound.is_finite() && !upper_bound.is_finite() {
            debug!(constraint = id, "Skipping constraint without finite bounds");
        }
        Ok(())
    }

    fn add_linear_objective_term(
        &mut self,
        variable_id: &str,
        coefficient: f64,
    ) -> Result<(), SolverError> {
        match self.variables.get_mut(variable_id) {
            Some(var) => {
                var.objective_coefficient += coefficient;
                Ok(())
            }
            None => Err(SolverError::UnknownVariable(variable_id.to_string())),
        }
    }

    fn set_objective_sense(&mut self, objective_sense: ObjectiveSense) -> Result<(), SolverError> {
        self.sense = objective_sense;
        Ok(())
    }

    fn set_parameter(&mut self, name: &str, value: &ParameterValue) -> Result<(), SolverError> {
        match name {
            POOL_SEARCH_MODE | POOL_SOLUTIONS | TIME_LIMIT => {
                warn!(
                    parameter = name,
                    value = %value,
                    "microlp does not support this parameter, ignoring it"
                );
                Ok(())
            }
            _ => Err(SolverError::UnknownParameter(name.to_string())),
        }
    }

    fn solve(&mut self) -> Result<ProblemSolution, SolverError> {
        if let Some(row) = self
            .rows
            .iter()
            .find(|r| r.terms.is_empty() && Self::empty_row_violated(r))
        {
            debug!(constraint = %row.id, "Constraint without terms can't be satisfied");
            return Ok(ProblemSolution::without_incumbent(
                OptimizationStatus::Infeasible,
            ));
        }

        let direction = match self.sense {
            ObjectiveSense::Maximize => OptimizationDirection::Maximize,
            ObjectiveSense::Minimize => OptimizationDirection::Minimize,
        };
        let implied = self.implied_upper_bounds();
        let mut problem = ::microlp::Problem::new(direction);
        let handles: Vec<::microlp::Variable> = self
            .variables
            .iter()
            .zip(&implied)
            .map(|((id, var), implied)| match var.variable_type {
                VariableType::Continuous => problem.add_var(
                    var.objective_coefficient,
                    (var.lower_bound, var.upper_bound),
                ),
                VariableType::Integer => {
                    let upper = integer_upper_bound(var.lower_bound, *implied);
                    if !upper.is_finite() {
                        warn!(variable = %id, "No finite bound for integer variable");
                    }
                    problem.add_integer_var(
                        var.objective_coefficient,
                        (integer_bound(var.lower_bound), integer_bound(upper)),
                    )
                }
                VariableType::Binary => problem.add_binary_var(var.objective_coefficient),
            })
            .collect();
        for row in self.rows.iter().filter(|r| !r.terms.is_empty()) {
            let expr: Vec<(::microlp::Variable, f64)> = row
                .terms
                .iter()
                .map(|(position, coef)| (handles[*position], *coef))
                .collect();
            problem.add_constraint(expr, row.comparison.into(), row.rhs);
        }

        debug!(
            variables = handles.len(),
            rows = self.rows.len(),
            "Handing problem to microlp"
        );
        match problem.solve() {
            Ok(solution) => {
                let variable_values: IndexMap<String, f64> = self
                    .variables
                    .keys()
                    .zip(&handles)
                    .map(|(id, handle)| (id.clone(), solution[*handle]))
                    .collect();
                Ok(ProblemSolution {
                    status: OptimizationStatus::Optimal,
                    objective_value: Some(solution.objective()),
                    variable_values: Some(variable_values),
                    solution_count: 1,
                })
            }
            Err(::microlp::Error::Infeasible) => Ok(ProblemSolution::without_incumbent(
                OptimizationStatus::Infeasible,
            )),
            Err(::microlp::Error::Unbounded) => Ok(ProblemSolution::without_incumbent(
                OptimizationStatus::Unbounded,
            )),
            Err(e) => {
                warn!(error = %e, "microlp failed to solve the problem");
                Ok(ProblemSolution::without_incumbent(OptimizationStatus::Other))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_small_integer_program() {
        // max 3x + 2y, x + y <= 4.5, x <= 2.5, x, y integer
        let mut solver = MicrolpSolver::new();
        solver.add_integer_variable("x", 0.0, f64::INFINITY).unwrap();
        solver.add_integer_variable("y", 0.0, f64::INFINITY).unwrap();
        solver.add_linear_objective_term("x", 3.0).unwrap();
        solver.add_linear_objective_term("y", 2.0).unwrap();
        solver
            .add_inequality_constraint("total", &["x", "y"], &[1.0, 1.0], f64::NEG_INFINITY, 4.5)
            .unwrap();
        solver
            .add_inequality_constraint("x_cap", &["x"], &[1.0], f64::NEG_INFINITY, 2.5)
            .unwrap();
        solver.set_objective_sense(ObjectiveSense::Maximize).unwrap();

        let solution = solver.solve().unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert_eq!(solution.solution_count, 1);
        let values = solution.variable_values.unwrap();
        assert!((values["x"] - 2.0).abs() < 1e-6);
        assert!((values["y"] - 2.0).abs() < 1e-6);
        assert!((solution.objective_value.unwrap() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn repeated_variable_terms_are_merged() {
        let mut solver = MicrolpSolver::new();
        solver.add_integer_variable("x", 0.0, f64::INFINITY).unwrap();
        solver.add_linear_objective_term("x", 1.0).unwrap();
        solver
            .add_inequality_constraint("twice", &["x", "x"], &[1.0, 1.0], f64::NEG_INFINITY, 6.0)
            .unwrap();
        let solution = solver.solve().unwrap();
        assert!((solution.variable_values.unwrap()["x"] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn reports_infeasible() {
        let mut solver = MicrolpSolver::new();
        solver.add_integer_variable("x", 0.0, f64::INFINITY).unwrap();
        solver.add_linear_objective_term("x", 1.0).unwrap();
        solver
            .add_inequality_constraint("cap", &["x"], &[1.0], f64::NEG_INFINITY, 1.0)
            .unwrap();
        solver
            .add_inequality_constraint("floor", &["x"], &[1.0], 2.0, f64::INFINITY)
            .unwrap();
        let solution = solver.solve().unwrap();
        assert_eq!(solution.status, OptimizationStatus::Infeasible);
        assert_eq!(solution.solution_count, 0);
        assert!(solution.variable_values.is_none());
    }

    #[test]
    fn unknown_variable_and_parameter() {
        let mut solver = MicrolpSolver::new();
        assert_eq!(
            solver.add_linear_objective_term("missing", 1.0),
            Err(SolverError::UnknownVariable("missing".to_string()))
        );
        assert!(solver
            .set_parameter(POOL_SOLUTIONS, &ParameterValue::Int(10))
            .is_ok());
        assert_eq!(
            solver.set_parameter("Presolve", &ParameterValue::Int(0)),
            Err(SolverError::UnknownParameter("Presolve".to_string()))
        );
    }

    /// Two doors sharing one SKU with sizes S (ratio 2, supply 6) and M (ratio 3, supply 9)
    fn two_door_solver(with_eligibility: bool) -> MicrolpSolver {
        let mut solver = MicrolpSolver::new();
        for id in ["runs[door1,sku1]", "runs[door2,sku1]"] {
            solver.add_integer_variable(id, 0.0, f64::INFINITY).unwrap();
        }
        solver.add_linear_objective_term("runs[door1,sku1]", 10.0).unwrap();
        solver.add_linear_objective_term("runs[door2,sku1]", 5.0).unwrap();
        if with_eligibility {
            solver
                .add_inequality_constraint(
                    "eligibility[door1,sku1]",
                    &["runs[door1,sku1]"],
                    &[1.0],
                    f64::NEG_INFINITY,
                    3.0,
                )
                .unwrap();
            solver
                .add_inequality_constraint(
                    "eligibility[door2,sku1]",
                    &["runs[door2,sku1]"],
                    &[1.0],
                    f64::NEG_INFINITY,
                    0.0,
                )
                .unwrap();
        }
        let both = ["runs[door1,sku1]", "runs[door2,sku1]"];
        solver
            .add_inequality_constraint("supply[sku1,M]", &both, &[3.0, 3.0], f64::NEG_INFINITY, 9.0)
            .unwrap();
        solver
            .add_inequality_constraint("supply[sku1,S]", &both, &[2.0, 2.0], f64::NEG_INFINITY, 6.0)
            .unwrap();
        solver.set_objective_sense(ObjectiveSense::Maximize).unwrap();
        solver
    }

    #[test]
    fn unbounded_integer_columns_solve_exactly() {
        for with_eligibility in [true, false] {
            let solution = two_door_solver(with_eligibility).solve().unwrap();
            assert_eq!(solution.status, OptimizationStatus::Optimal);
            assert!((solution.objective_value.unwrap() - 30.0).abs() < 1e-6);
            let values = solution.variable_values.unwrap();
            assert!((values["runs[door1,sku1]"] - 3.0).abs() < 1e-6);
            assert!(values["runs[door2,sku1]"].abs() < 1e-6);
        }
    }

    #[test]
    fn upper_bounds_implied_by_rows() {
        let solver = two_door_solver(true);
        assert_eq!(solver.implied_upper_bounds(), vec![3.0, 0.0]);
        assert_eq!(two_door_solver(false).implied_upper_bounds(), vec![3.0, 3.0]);
        assert_eq!(integer_upper_bound(0.0, 2.5), 2.0);
        assert_eq!(integer_upper_bound(0.0, 2.9999999999), 3.0);
        assert_eq!(integer_upper_bound(0.0, -1.0), 0.0);
        assert_eq!(integer_upper_bound(0.0, f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn integer_bounds_saturate() {
        assert_eq!(integer_bound(f64::INFINITY), i32::MAX);
        assert_eq!(integer_bound(f64::NEG_INFINITY), i32::MIN);
        assert_eq!(integer_bound(3.0), 3);
    }
}
