//! Run configuration for an allocation
use std::fs;
use std::path::Path;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::io::IoError;
use crate::optimize::solvers::{
    ParameterValue, SolverBackend, SolverParameters, POOL_SEARCH_MODE, POOL_SOLUTIONS, TIME_LIMIT,
};

/// Settings for one allocation run
///
/// Every field has a default, so a JSON configuration only needs to name what it changes.
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Run values at or below this are treated as zero when summarizing allocations
    #[builder(default = "1e-6")]
    pub tolerance: f64,
    /// Solver backend to use
    #[builder(default = "SolverBackend::default_backend()")]
    pub solver: SolverBackend,
    /// Ask the solver for a pool of alternative solutions
    #[builder(default = "false")]
    pub use_solution_pool: bool,
    /// How hard the solver searches for alternatives, when the pool is used
    #[builder(default = "2")]
    pub pool_search_mode: i64,
    /// Maximum number of alternative solutions kept, when the pool is used
    #[builder(default = "10")]
    pub pool_solutions: i64,
    /// Solve time limit in seconds
    #[builder(default = "None")]
    pub time_limit: Option<f64>,
    /// Name of the built program
    #[builder(default = "\"full_run_allocation\".to_string()")]
    pub model_name: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            tolerance: 1e-6,
            solver: SolverBackend::default_backend(),
            use_solution_pool: false,
            pool_search_mode: 2,
            pool_solutions: 10,
            time_limit: None,
            model_name: "full_run_allocation".to_string(),
        }
    }
}

impl Configuration {
    /// Read a configuration from a JSON file
    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Configuration, IoError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| IoError::Filesystem {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&data).map_err(|e| IoError::Deserialize {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Solver parameters implied by this configuration
    pub fn solver_parameters(&self) -> SolverParameters {
        let mut parameters = SolverParameters::new();
        if self.use_solution_pool {
            parameters.insert(
                POOL_SEARCH_MODE.to_string(),
                ParameterValue::Int(self.pool_search_mode),
            );
            parameters.insert(
                POOL_SOLUTIONS.to_string(),
                ParameterValue::Int(self.pool_solutions),
            );
        }
        if let Some(seconds) = self.time_limit {
            parameters.insert(TIME_LIMIT.to_string(), ParameterValue::Float(seconds));
        }
        parameters
    }
}
