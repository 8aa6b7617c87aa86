//! Solver interface for the HiGHS solver
use ::highs::{HighsModelStatus, RowProblem, Sense};
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
    terms: IndexMap<usize, f64>,
    lower_bound: f64,
    upper_bound: f64,
}

/// HiGHS backend, columns and rows are buffered until `solve` so objective
/// coefficients can be attached to columns on creation
#[derive(Clone, Debug)]
pub struct HighsSolver {
    variables: IndexMap<String, BufferedVariable>,
    rows: Vec<BufferedRow>,
    sense: ObjectiveSense,
    time_limit: Option<f64>,
}

impl HighsSolver {
    pub fn new() -> Self {
        Self {
            variables: IndexMap::new(),
            rows: Vec::new(),
            sense: ObjectiveSense::Maximize,
            time_limit: None,
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
        variables: &[&str],
        coefficients: &[f64],
        lower_bound: f64,
        upper_bound: f64,
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
            terms,
            lower_bound,
            upper_bound,
        });
        Ok(())
    }
}

impl Default for HighsSolver {
    fn default() -> Self {
        Self::new()
    }
}

fn translate_status(status: HighsModelStatus) -> OptimizationStatus {
    match status {
        HighsModelStatus::Optimal | HighsModelStatus::ModelEmpty => OptimizationStatus::Optimal,
        HighsModelStatus::ReachedTimeLimit => OptimizationStatus::TimeLimit,
        HighsModelStatus::ReachedIterationLimit => OptimizationStatus::Interrupted,
        HighsModelStatus::Infeasible => OptimizationStatus::Infeasible,
        HighsModelStatus::Unbounded => OptimizationStatus::Unbounded,
        other => {
            warn!(status = ?other, "HiGHS finished with an unrecognised status");
            OptimizationStatus::Other
        }
    }
}

/// Whether a finished solve left a primal solution behind
///
/// HiGHS reports an infinite MIP gap until it finds its first incumbent, so a time or
/// iteration limit with an infinite gap has nothing to read back.
fn has_incumbent(status: OptimizationStatus, mip_gap: f64) -> bool {
    match status {
        OptimizationStatus::Optimal => true,
        OptimizationStatus::TimeLimit | OptimizationStatus::Interrupted => mip_gap.is_finite(),
        _ => false,
    }
}

impl Solver for HighsSolver {
    fn name(&self) -> &'static str {
        "highs"
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
        _id: &str,
        variables: &[&str],
        coefficients: &[f64],
        equals: f64,
    ) -> Result<(), SolverError> {
        self.add_row(variables, coefficients, equals, equals)
    }

    fn add_inequality_constraint(
        &mut self,
        _id: &str,
        variables: &[&str],
        coefficients: &[f64],
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), SolverError> {
        self.add_row(variables, coefficients, lower_bound, upper_bound)
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
            TIME_LIMIT => match value.as_f64() {
                Some(seconds) if seconds > 0.0 => {
                    self.time_limit = Some(seconds);
                    Ok(())
                }
                _ => Err(SolverError::InvalidParameterValue {
                    name: name.to_string(),
                    value: value.to_string(),
                }),
            },
            POOL_SEARCH_MODE | POOL_SOLUTIONS => {
                warn!(
                    parameter = name,
                    value = %value,
                    "HiGHS does not keep a solution pool, ignoring parameter"
                );
                Ok(())
            }
            _ => Err(SolverError::UnknownParameter(name.to_string())),
        }
    }

    fn solve(&mut self) -> Result<ProblemSolution, SolverError> {
        let mut problem = RowProblem::new();
        let columns: Vec<::highs::Col> = self
            .variables
            .values()
            .map(|var| match var.variable_type {
                VariableType::Continuous => problem.add_column(
                    var.objective_coefficient,
                    var.lower_bound..=var.upper_bound,
                ),
                VariableType::Integer => problem.add_integer_column(
                    var.objective_coefficient,
                    var.lower_bound..=var.upper_bound,
                ),
                VariableType::Binary => {
                    problem.add_integer_column(var.objective_coefficient, 0.0..=1.0)
                }
            })
            .collect();
        for row in &self.rows {
            let terms: Vec<(::highs::Col, f64)> = row
                .terms
                .iter()
                .map(|(position, coef)| (columns[*position], *coef))
                .collect();
            problem.add_row(row.lower_bound..=row.upper_bound, terms);
        }

        let sense = match self.sense {
            ObjectiveSense::Maximize => Sense::Maximise,
            ObjectiveSense::Minimize => Sense::Minimise,
        };
        let mut model = problem.optimise(sense);
        model.set_option("output_flag", false);
        if let Some(seconds) = self.time_limit {
            model.set_option("time_limit", seconds);
        }

        debug!(
            columns = columns.len(),
            rows = self.rows.len(),
            "Handing problem to HiGHS"
        );
        let solved = model.solve();
        let status = translate_status(solved.status());
        if !status.is_usable() {
            return Ok(ProblemSolution::without_incumbent(status));
        }
        if !has_incumbent(status, solved.mip_gap()) {
            debug!(status = %status, "HiGHS stopped before finding an incumbent");
            return Ok(ProblemSolution::without_incumbent(status));
        }

        let solution = solved.get_solution();
        let variable_values: IndexMap<String, f64> = self
            .variables
            .keys()
            .zip(solution.columns())
            .map(|(id, value)| (id.clone(), *value))
            .collect();
        let objective_value: f64 = self
            .variables
            .values()
            .zip(solution.columns())
            .map(|(var, value)| var.objective_coefficient * value)
            .sum();
        Ok(ProblemSolution {
            status,
            objective_value: Some(objective_value),
            variable_values: Some(variable_values),
            // Incumbents of an interrupted solve are verified by the problem before use
            solution_count: 1,
        })
    }
}
