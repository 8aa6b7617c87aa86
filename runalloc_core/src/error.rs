//! Errors ending an allocation run
use thiserror::Error;

use crate::data::DataIntegrityError;
use crate::optimize::problem::ProblemError;
use crate::optimize::solvers::SolverError;
use crate::optimize::OptimizationStatus;

/// Every failure is terminal for the run, no partial report is produced
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
    /// The input data has to be fixed by the operator
    #[error(transparent)]
    DataIntegrity(#[from] DataIntegrityError),
    /// Validated data did not hold what model building needed, this is a bug
    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("model did not solve successfully (status={0})")]
    SolveFailed(OptimizationStatus),
    #[error("Model has no solution to summarize")]
    NoSolution,
}

/// Problem errors only arise from model building or from reading a missing solution
impl From<ProblemError> for AllocationError {
    fn from(err: ProblemError) -> Self {
        match err {
            ProblemError::NoSolution => AllocationError::NoSolution,
            other => AllocationError::InternalConsistency(other.to_string()),
        }
    }
}
