//! Module for constructing and solving optimization problems

pub mod constraint;
pub mod objective;
pub mod problem;
pub mod solvers;
pub mod variable;

use std::fmt::{Display, Formatter};

use indexmap::IndexMap;

/// Struct representing the solution to an optimization problem, as reported by a solver
#[derive(Debug, Clone)]
pub struct ProblemSolution {
    /// The status of the optimization problem, representing if the optimization was
    /// completed successfully
    pub status: OptimizationStatus,
    /// Value of the objective at the incumbent
    ///
    /// Some(f64) if the solver found a solution, None otherwise
    pub objective_value: Option<f64>,
    /// Values of the variables at the incumbent
    ///
    /// Some(IndexMap), keyed by variable id, if the solver found a solution, None otherwise
    pub variable_values: Option<IndexMap<String, f64>>,
    /// Number of feasible solutions the solver found
    pub solution_count: usize,
}

impl ProblemSolution {
    /// A solution carrying only a status, with no incumbent
    pub fn without_incumbent(status: OptimizationStatus) -> Self {
        Self {
            status,
            objective_value: None,
            variable_values: None,
            solution_count: 0,
        }
    }
}

/// Status of an optimization problem
///
/// Solver backends translate their own status codes into this taxonomy, callers never
/// see backend specific values.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OptimizationStatus {
    /// Problem has not yet attempted to be optimized
    Unoptimized,
    /// Problem has been solved to optimality
    Optimal,
    /// Solve was aborted early, an incumbent may be available
    Interrupted,
    /// The solver hit the time limit, an incumbent may or may not be available
    TimeLimit,
    /// Problem can't be solved because it is infeasible (conflicting constraints)
    Infeasible,
    /// Problem can't be optimized because objective value is not bounded
    Unbounded,
    /// Any other terminal state reported by the solver
    Other,
}

impl OptimizationStatus {
    /// Whether a result with this status may be used to produce reports
    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            OptimizationStatus::Optimal
                | OptimizationStatus::Interrupted
                | OptimizationStatus::TimeLimit
        )
    }
}

impl Display for OptimizationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            OptimizationStatus::Unoptimized => "unoptimized",
            OptimizationStatus::Optimal => "optimal",
            OptimizationStatus::Interrupted => "interrupted",
            OptimizationStatus::TimeLimit => "time_limit",
            OptimizationStatus::Infeasible => "infeasible",
            OptimizationStatus::Unbounded => "unbounded",
            OptimizationStatus::Other => "other",
        };
        write!(f, "{}", status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usable_statuses() {
        assert!(OptimizationStatus::Optimal.is_usable());
        assert!(OptimizationStatus::Interrupted.is_usable());
        assert!(OptimizationStatus::TimeLimit.is_usable());
        assert!(!OptimizationStatus::Infeasible.is_usable());
        assert!(!OptimizationStatus::Unbounded.is_usable());
        assert!(!OptimizationStatus::Other.is_usable());
        assert!(!OptimizationStatus::Unoptimized.is_usable());
    }
}
