//! Solver capability interface, and the backends implementing it
pub mod microlp;

#[cfg(feature = "highs")]
pub mod highs;

use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::optimize::objective::ObjectiveSense;
use crate::optimize::ProblemSolution;

/// Parameter selecting how hard the solver searches for alternative solutions
pub const POOL_SEARCH_MODE: &str = "PoolSearchMode";
/// Parameter bounding the number of alternative solutions kept
pub const POOL_SOLUTIONS: &str = "PoolSolutions";
/// Parameter limiting solve time, in seconds
pub const TIME_LIMIT: &str = "TimeLimit";

/// Value of a solver parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParameterValue {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Int(v) => Some(*v as f64),
            ParameterValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl Display for ParameterValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterValue::Bool(v) => write!(f, "{}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Solver parameters, applied in insertion order
pub type SolverParameters = IndexMap<String, ParameterValue>;

/// Capabilities a solver backend offers to the core
///
/// A backend receives variables, constraints and objective terms by id, and
/// reports its result as a [`ProblemSolution`] keyed by the same ids.
pub trait Solver {
    /// Name of the backend, used in logs
    fn name(&self) -> &'static str;

    fn integer_variable_capable(&self) -> bool;

    fn add_continuous_variable(
        &mut self,
        id: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), SolverError>;

    fn add_integer_variable(
        &mut self,
        id: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), SolverError>;

    fn add_equality_constraint(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        equals: f64,
    ) -> Result<(), SolverError>;

    /// Add `lower_bound <= terms <= upper_bound`, either bound may be infinite
    fn add_inequality_constraint(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), SolverError>;

    fn add_linear_objective_term(
        &mut self,
        variable_id: &str,
        coefficient: f64,
    ) -> Result<(), SolverError>;

    fn set_objective_sense(&mut self, objective_sense: ObjectiveSense) -> Result<(), SolverError>;

    fn set_parameter(&mut self, name: &str, value: &ParameterValue) -> Result<(), SolverError>;

    /// Solve the loaded problem, blocking until the solver returns
    fn solve(&mut self) -> Result<ProblemSolution, SolverError>;
}

cfg_if::cfg_if! {
    if #[cfg(feature = "highs")] {
        const DEFAULT_BACKEND: SolverBackend = SolverBackend::Highs;
    } else {
        const DEFAULT_BACKEND: SolverBackend = SolverBackend::Microlp;
    }
}

/// Enum used to select the solver backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverBackend {
    /// Pure rust branch and bound solver
    Microlp,
    /// The HiGHS solver, requires the highs feature to be enabled
    Highs,
}

impl SolverBackend {
    /// Backend used when none is configured
    pub fn default_backend() -> Self {
        DEFAULT_BACKEND
    }
}

impl Default for SolverBackend {
    fn default() -> Self {
        Self::default_backend()
    }
}

impl Display for SolverBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverBackend::Microlp => write!(f, "microlp"),
            SolverBackend::Highs => write!(f, "highs"),
        }
    }
}

/// Create a fresh, empty solver for the given backend
pub fn new_solver(backend: SolverBackend) -> Result<Box<dyn Solver>, SolverError> {
    match backend {
        SolverBackend::Microlp => Ok(Box::new(microlp::MicrolpSolver::new())),
        #[cfg(feature = "highs")]
        SolverBackend::Highs => Ok(Box::new(highs::HighsSolver::new())),
        #[cfg(not(feature = "highs"))]
        SolverBackend::Highs => Err(SolverError::BackendUnavailable(backend.to_string())),
    }
}

/// Errors raised at the solver boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// Backend was not compiled into this build
    #[error("Solver backend {0} is not available in this build")]
    BackendUnavailable(String),
    /// Backend does not support a variable type
    #[error("Solver backend {backend} does not support {variable_type} variables")]
    UnsupportedVariableType {
        backend: &'static str,
        variable_type: String,
    },
    /// A variable was added twice
    #[error("Variable {0} was already added to the solver")]
    DuplicateVariable(String),
    /// A constraint or objective term refers to a variable never added
    #[error("Variable {0} has not been added to the solver")]
    UnknownVariable(String),
    /// Parameter name is not known to any backend
    #[error("Unknown solver parameter {0}")]
    UnknownParameter(String),
    /// Parameter value has the wrong type or range
    #[error("Invalid value {value} for solver parameter {name}")]
    InvalidParameterValue { name: String, value: String },
    /// The backend failed for a reason of its own
    #[error("Solver backend failure: {0}")]
    Backend(String),
}
