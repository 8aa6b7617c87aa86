//! A built allocation program together with the data it was built from
use tracing::info;

use crate::data::AllocationData;
use crate::error::AllocationError;
use crate::optimize::problem::Problem;
use crate::optimize::solvers::{Solver, SolverParameters};
use crate::optimize::OptimizationStatus;

use super::builder::runs_variable_id;

/// Allocation program and the `runs` variables of its doors and SKUs
#[derive(Debug, Clone)]
pub struct AllocationModel<'a> {
    name: String,
    problem: Problem,
    data: &'a AllocationData,
}

impl<'a> AllocationModel<'a> {
    pub(crate) fn new(name: &str, problem: Problem, data: &'a AllocationData) -> Self {
        Self {
            name: name.to_string(),
            problem,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn data(&self) -> &'a AllocationData {
        self.data
    }

    /// Optimize with `solver`, returning whatever status it reports
    pub fn optimize(
        &mut self,
        solver: &mut dyn Solver,
        parameters: &SolverParameters,
    ) -> Result<OptimizationStatus, AllocationError> {
        let status = self.problem.optimize(solver, parameters)?;
        info!(
            model = %self.name,
            backend = solver.name(),
            status = %status,
            solutions = self.problem.solution_count(),
            "Optimization finished"
        );
        Ok(status)
    }

    /// Optimize, failing unless the solve is optimal, interrupted or time limited
    pub fn solve(
        &mut self,
        solver: &mut dyn Solver,
        parameters: &SolverParameters,
    ) -> Result<OptimizationStatus, AllocationError> {
        let status = self.optimize(solver, parameters)?;
        if !status.is_usable() {
            return Err(AllocationError::SolveFailed(status));
        }
        Ok(status)
    }

    pub fn status(&self) -> OptimizationStatus {
        self.problem.status()
    }

    /// Solver value of `runs[door,sku]`
    pub fn runs(&self, door: &str, sku: &str) -> Result<f64, AllocationError> {
        Ok(self.problem.variable_value(&runs_variable_id(door, sku))?)
    }

    pub fn objective_value(&self) -> Result<f64, AllocationError> {
        Ok(self.problem.objective_value()?)
    }
}
