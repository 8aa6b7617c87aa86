//! Provides struct representing an optimization problem
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::optimize::constraint::{Constraint, ConstraintSense};
use crate::optimize::objective::{Objective, ObjectiveSense, ObjectiveTerm};
use crate::optimize::solvers::{Solver, SolverError, SolverParameters};
use crate::optimize::variable::{Variable, VariableBuilder, VariableType};
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// Tolerance used when checking an incumbent against the constraints
const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// An optimization problem
#[derive(Debug, Clone)]
pub struct Problem {
    /// Objective to optimize
    objective: Objective,
    /// Variables of the optimization problem
    variables: IndexMap<String, Variable>,
    /// Constraints of the optimization problem
    constraints: IndexMap<String, Constraint>,
    /// Current status of the optimization problem
    status: OptimizationStatus,
    /// Result of the last optimization. Will be None before optimization
    solution: Option<ProblemSolution>,
    /// Type of problem
    problem_type: ProblemType,
}

impl Problem {
    // region Creation Functions
    /// Create a new optimization problem
    pub fn new(objective_sense: ObjectiveSense) -> Self {
        Self {
            objective: Objective::new(objective_sense),
            variables: IndexMap::new(),
            constraints: IndexMap::new(),
            status: OptimizationStatus::Unoptimized,
            solution: None,
            problem_type: ProblemType::LinearContinuous,
        }
    }

    /// Create a new maximization problem
    pub fn new_maximization() -> Self {
        Self::new(ObjectiveSense::Maximize)
    }

    // endregion Creation Functions

    // region Adding Variables
    /// Add a variable to the optimization problem
    pub fn add_variable(&mut self, mut variable: Variable) -> Result<(), ProblemError> {
        self.validate_variable(&variable)?;
        variable.index = self.variables.len();
        if variable.variable_type != VariableType::Continuous {
            self.problem_type = ProblemType::LinearMixedInteger;
        }
        self.variables.insert(variable.id.clone(), variable);
        Ok(())
    }

    /// Create a new variable and add it to the optimization problem
    pub fn add_new_variable(
        &mut self,
        id: &str,
        name: Option<&str>,
        variable_type: VariableType,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        let variable = VariableBuilder::default()
            .id(id)
            .name(name.map(|n| n.to_string()))
            .variable_type(variable_type)
            .lower_bound(lower_bound)
            .upper_bound(upper_bound)
            .build()
            .map_err(|e| ProblemError::InvalidVariable(e.to_string()))?;
        self.add_variable(variable)
    }
    // endregion Adding Variables

    // region Adding Constraints
    /// Add a constraint to the problem
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), ProblemError> {
        self.validate_constraint(&constraint)?;
        self.constraints.insert(constraint.id.clone(), constraint);
        Ok(())
    }

    /// Create a new constraint from variable ids, and add it to the problem
    pub fn add_new_constraint_by_id(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        sense: ConstraintSense,
        rhs: f64,
    ) -> Result<(), ProblemError> {
        if variables.len() != coefficients.len() {
            return Err(ProblemError::MismatchedTermLengths(id.to_string()));
        }
        self.add_constraint(Constraint::new(id, variables, coefficients, sense, rhs))
    }
    // endregion Adding Constraints

    // region Adding Objective Terms
    /// Add a new term to the objective
    pub fn add_objective_term(&mut self, objective_term: ObjectiveTerm) -> Result<(), ProblemError> {
        if !self.variables.contains_key(&objective_term.variable) {
            return Err(ProblemError::NonExistentVariablesInObjective(
                objective_term.variable,
            ));
        }
        self.objective.add_term(objective_term);
        Ok(())
    }

    /// Add a new linear term to the objective using the variable id
    pub fn add_new_linear_objective_term_by_id(
        &mut self,
        variable_id: &str,
        coefficient: f64,
    ) -> Result<(), ProblemError> {
        self.add_objective_term(ObjectiveTerm::new(variable_id, coefficient))
    }
    // endregion Adding Objective Terms

    // region Validation Functions
    /// Check that a variable to be added is valid to add to this problem
    fn validate_variable(&self, variable: &Variable) -> Result<(), ProblemError> {
        if self.variables.contains_key(&variable.id) {
            return Err(ProblemError::VariableIdAlreadyExists(variable.id.clone()));
        }
        if variable.lower_bound > variable.upper_bound
            || variable.lower_bound.is_nan()
            || variable.upper_bound.is_nan()
        {
            return Err(ProblemError::InvalidVariableBounds(variable.id.clone()));
        }
        Ok(())
    }

    /// Check that a constraint to be added is valid to add to this Problem
    fn validate_constraint(&self, constraint: &Constraint) -> Result<(), ProblemError> {
        if self.constraints.contains_key(&constraint.id) {
            return Err(ProblemError::ConstraintAlreadyExists(constraint.id.clone()));
        }
        if constraint.rhs.is_nan() {
            return Err(ProblemError::InvalidConstraintBounds(constraint.id.clone()));
        }
        if let Some(missing) = constraint
            .variable_ids()
            .find(|id| !self.variables.contains_key(*id))
        {
            return Err(ProblemError::NonExistentVariablesInConstraint {
                constraint: constraint.id.clone(),
                variable: missing.to_string(),
            });
        }
        Ok(())
    }
    // endregion Validation Functions

    // region Solving
    /// Load the problem into `solver`, apply `parameters`, and solve
    ///
    /// The returned status is also kept on the problem. For anything other than an
    /// optimal result, the incumbent is checked against every constraint and variable
    /// domain, and an incumbent failing the check is discarded.
    pub fn optimize(
        &mut self,
        solver: &mut dyn Solver,
        parameters: &SolverParameters,
    ) -> Result<OptimizationStatus, SolverError> {
        if self.problem_type == ProblemType::LinearMixedInteger
            && !solver.integer_variable_capable()
        {
            return Err(SolverError::UnsupportedVariableType {
                backend: solver.name(),
                variable_type: VariableType::Integer.to_string(),
            });
        }
        self.load_into(solver)?;
        for (name, value) in parameters {
            solver.set_parameter(name, value)?;
        }

        debug!(
            backend = solver.name(),
            variables = self.num_variables(),
            constraints = self.num_constraints(),
            "Solving problem"
        );
        let mut solution = solver.solve()?;
        if solution.status != OptimizationStatus::Optimal && solution.solution_count > 0 {
            let feasible = solution
                .variable_values
                .as_ref()
                .map(|values| self.is_feasible(values, FEASIBILITY_TOLERANCE))
                .unwrap_or(false);
            if !feasible {
                warn!(status = %solution.status, "Discarding incumbent that violates the problem");
                solution.solution_count = 0;
                solution.variable_values = None;
                solution.objective_value = None;
            }
        }
        self.status = solution.status;
        self.solution = Some(solution);
        Ok(self.status)
    }

    fn load_into(&self, solver: &mut dyn Solver) -> Result<(), SolverError> {
        for var in self.variables.values() {
            match var.variable_type {
                VariableType::Continuous => {
                    solver.add_continuous_variable(&var.id, var.lower_bound, var.upper_bound)?
                }
                VariableType::Integer => {
                    solver.add_integer_variable(&var.id, var.lower_bound, var.upper_bound)?
                }
                VariableType::Binary => solver.add_integer_variable(&var.id, 0.0, 1.0)?,
            }
        }
        for cons in self.constraints.values() {
            let variables: Vec<&str> = cons.variable_ids().collect();
            let coefficients: Vec<f64> = cons.terms.iter().map(|t| t.coefficient).collect();
            match cons.sense {
                ConstraintSense::Equal => {
                    solver.add_equality_constraint(&cons.id, &variables, &coefficients, cons.rhs)?
                }
                _ => {
                    let (lower_bound, upper_bound) = cons.bounds();
                    solver.add_inequality_constraint(
                        &cons.id,
                        &variables,
                        &coefficients,
                        lower_bound,
                        upper_bound,
                    )?
                }
            }
        }
        for term in self.objective.terms() {
            solver.add_linear_objective_term(&term.variable, term.coefficient)?;
        }
        solver.set_objective_sense(self.objective.sense())
    }

    /// Whether the given values satisfy every variable domain and constraint
    pub fn is_feasible(&self, values: &IndexMap<String, f64>, tolerance: f64) -> bool {
        let variables_ok = self.variables.values().all(|var| {
            values
                .get(&var.id)
                .map(|v| var.admits(*v, tolerance))
                .unwrap_or(false)
        });
        variables_ok
            && self
                .constraints
                .values()
                .all(|cons| cons.is_satisfied(values, tolerance))
    }
    // endregion Solving

    // region Solution Access
    /// Status of the last optimization
    pub fn status(&self) -> OptimizationStatus {
        self.status
    }

    /// Number of feasible solutions available from the last optimization
    pub fn solution_count(&self) -> usize {
        self.solution.as_ref().map(|s| s.solution_count).unwrap_or(0)
    }

    /// Values of all variables at the incumbent
    pub fn variable_values(&self) -> Result<&IndexMap<String, f64>, ProblemError> {
        self.solution
            .as_ref()
            .filter(|s| s.solution_count > 0)
            .and_then(|s| s.variable_values.as_ref())
            .ok_or(ProblemError::NoSolution)
    }

    /// Value of a single variable at the incumbent
    pub fn variable_value(&self, id: &str) -> Result<f64, ProblemError> {
        let values = self.variable_values()?;
        values
            .get(id)
            .copied()
            .ok_or_else(|| ProblemError::NonExistentVariable(id.to_string()))
    }

    /// Objective value at the incumbent
    pub fn objective_value(&self) -> Result<f64, ProblemError> {
        let values = self.variable_values()?;
        Ok(self
            .solution
            .as_ref()
            .and_then(|s| s.objective_value)
            .unwrap_or_else(|| self.objective.evaluate(values)))
    }

    /// Slack, right hand side and sense of every constraint at the incumbent,
    /// in the order the constraints were added
    pub fn constraint_diagnostics(&self) -> Result<Vec<ConstraintDiagnostic>, ProblemError> {
        let values = self.variable_values()?;
        Ok(self
            .constraints
            .values()
            .map(|cons| ConstraintDiagnostic {
                name: cons.id.clone(),
                slack: cons.slack(values),
                rhs: cons.rhs,
                sense: cons.sense,
            })
            .collect())
    }
    // endregion Solution Access

    // region Check Problem
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn problem_type(&self) -> &ProblemType {
        &self.problem_type
    }

    pub fn variables(&self) -> &IndexMap<String, Variable> {
        &self.variables
    }

    pub fn constraints(&self) -> &IndexMap<String, Constraint> {
        &self.constraints
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }
    // endregion Check Problem
}

/// Diagnostic view of a constraint at a solution
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintDiagnostic {
    /// Id of the constraint
    pub name: String,
    /// `rhs - lhs` at the solution, zero when the constraint is binding
    pub slack: f64,
    /// Right hand side of the constraint
    pub rhs: f64,
    /// Sense of the constraint
    pub sense: ConstraintSense,
}

/// Types of optimization problems
#[derive(Clone, Debug, PartialEq)]
pub enum ProblemType {
    /// Problem with linear objectives and constraints, and continuous variables
    LinearContinuous,
    /// Problem with linear objective and constraints, with integer and continuous variables
    LinearMixedInteger,
}

/// Errors associated with the Problem
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    /// Error when trying to add a variable with the same id as an existing variable
    #[error("Tried to add variable {0} with the same id as an existing variable")]
    VariableIdAlreadyExists(String),
    /// Error when a variable can't be constructed
    #[error("Tried to add an invalid variable: {0}")]
    InvalidVariable(String),
    /// Error when trying to add variable with invalid bounds
    #[error("Tried to add variable {0} with lower_bound > upper_bound")]
    InvalidVariableBounds(String),
    /// Error when trying to add a constraint with the same id as an existing constraint
    #[error("Tried to add constraint {0} with the same id as an existing constraint")]
    ConstraintAlreadyExists(String),
    /// Error when trying to add a constraint with an invalid right hand side
    #[error("Tried to add constraint {0} with an invalid right hand side")]
    InvalidConstraintBounds(String),
    /// Error when variables and coefficients of a constraint don't pair up
    #[error("Constraint {0} has a different number of variables and coefficients")]
    MismatchedTermLengths(String),
    /// Error when trying to add a constraint that contains variables not in the model
    #[error("Tried to add constraint {constraint} with variable {variable} not in the model")]
    NonExistentVariablesInConstraint { constraint: String, variable: String },
    /// Error when trying to add an objective term which includes variables not in the model
    #[error("Tried adding an objective term with variable {0} not in the model")]
    NonExistentVariablesInObjective(String),
    /// Error when trying to access a variable that doesn't exist
    #[error("Tried to access variable {0} that doesn't exist")]
    NonExistentVariable(String),
    /// Error when reading solution values before a solution exists
    #[error("Problem has no solution, optimize first")]
    NoSolution,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::solvers::microlp::MicrolpSolver;
    use crate::optimize::solvers::ParameterValue;

    /// A solver returning a fixed result, for checking how the problem treats it
    struct FixedSolver {
        result: ProblemSolution,
    }

    impl Solver for FixedSolver {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn integer_variable_capable(&self) -> bool {
            true
        }
        fn add_continuous_variable(&mut self, _: &str, _: f64, _: f64) -> Result<(), SolverError> {
            Ok(())
        }
        fn add_integer_variable(&mut self, _: &str, _: f64, _: f64) -> Result<(), SolverError> {
            Ok(())
        }
        fn add_equality_constraint(
            &mut self,
            _: &str,
            _: &[&str],
            _: &[f64],
            _: f64,
        ) -> Result<(), SolverError> {
            Ok(())
        }
        fn add_inequality_constraint(
            &mut self,
            _: &str,
            _: &[&str],
            _: &[f64],
            _: f64,
            _: f64,
        ) -> Result<(), SolverError> {
            Ok(())
        }
        fn add_linear_objective_term(&mut self, _: &str, _: f64) -> Result<(), SolverError> {
            Ok(())
        }
        fn set_objective_sense(&mut self, _: ObjectiveSense) -> Result<(), SolverError> {
            Ok(())
        }
        fn set_parameter(&mut self, _: &str, _: &ParameterValue) -> Result<(), SolverError> {
            Ok(())
        }
        fn solve(&mut self) -> Result<ProblemSolution, SolverError> {
            Ok(self.result.clone())
        }
    }

    fn small_problem() -> Problem {
        let mut problem = Problem::new_maximization();
        problem
            .add_new_variable("x", None, VariableType::Integer, 0., f64::INFINITY)
            .unwrap();
        problem
            .add_new_variable("y", None, VariableType::Integer, 0., f64::INFINITY)
            .unwrap();
        problem
            .add_new_constraint_by_id("cap", &["x", "y"], &[1., 1.], ConstraintSense::LessEqual, 3.)
            .unwrap();
        problem
            .add_new_constraint_by_id("y_min", &["y"], &[1.], ConstraintSense::GreaterEqual, 1.)
            .unwrap();
        problem.add_new_linear_objective_term_by_id("x", 2.).unwrap();
        problem.add_new_linear_objective_term_by_id("y", 1.).unwrap();
        problem
    }

    fn incumbent(status: OptimizationStatus, x: f64, y: f64) -> ProblemSolution {
        ProblemSolution {
            status,
            objective_value: Some(2. * x + y),
            variable_values: Some(
                [("x".to_string(), x), ("y".to_string(), y)]
                    .into_iter()
                    .collect(),
            ),
            solution_count: 1,
        }
    }

    #[test]
    fn new_problem() {
        let max_problem = Problem::new_maximization();
        assert_eq!(max_problem.objective.sense(), ObjectiveSense::Maximize);
        assert_eq!(max_problem.status(), OptimizationStatus::Unoptimized);

        let min_problem = Problem::new(ObjectiveSense::Minimize);
        assert_eq!(min_problem.objective.sense(), ObjectiveSense::Minimize);
    }

    #[test]
    fn add_variables() {
        let mut problem = Problem::new_maximization();
        problem
            .add_new_variable("x", None, VariableType::Continuous, 64., 100.)
            .unwrap();
        let var = problem.variables().get("x").unwrap();
        assert_eq!(var.index(), 0);
        assert_eq!(problem.problem_type(), &ProblemType::LinearContinuous);

        problem
            .add_variable(Variable::new_non_negative_integer("y"))
            .unwrap();
        assert_eq!(problem.variables().get("y").unwrap().index(), 1);
        assert_eq!(problem.problem_type(), &ProblemType::LinearMixedInteger);

        assert_eq!(
            problem.add_new_variable("x", None, VariableType::Continuous, 0., 1.),
            Err(ProblemError::VariableIdAlreadyExists("x".to_string()))
        );
        assert_eq!(
            problem.add_new_variable("z", None, VariableType::Continuous, 100., 64.),
            Err(ProblemError::InvalidVariableBounds("z".to_string()))
        );
    }

    #[test]
    fn add_bad_constraints() {
        let mut problem = small_problem();
        assert_eq!(
            problem.add_new_constraint_by_id("cap", &["x"], &[1.], ConstraintSense::LessEqual, 1.),
            Err(ProblemError::ConstraintAlreadyExists("cap".to_string()))
        );
        assert_eq!(
            problem.add_new_constraint_by_id("c", &["w"], &[1.], ConstraintSense::LessEqual, 1.),
            Err(ProblemError::NonExistentVariablesInConstraint {
                constraint: "c".to_string(),
                variable: "w".to_string()
            })
        );
        assert_eq!(
            problem.add_new_constraint_by_id("c", &["x"], &[1., 2.], ConstraintSense::Equal, 1.),
            Err(ProblemError::MismatchedTermLengths("c".to_string()))
        );
        assert_eq!(
            problem.add_new_linear_objective_term_by_id("w", 1.),
            Err(ProblemError::NonExistentVariablesInObjective("w".to_string()))
        );
    }

    #[test]
    fn no_solution_before_optimize() {
        let problem = small_problem();
        assert_eq!(problem.solution_count(), 0);
        assert_eq!(problem.variable_value("x"), Err(ProblemError::NoSolution));
        assert_eq!(problem.constraint_diagnostics(), Err(ProblemError::NoSolution));
    }

    #[test]
    fn optimize_with_microlp() {
        let mut problem = small_problem();
        let mut solver = MicrolpSolver::new();
        let status = problem
            .optimize(&mut solver, &SolverParameters::new())
            .unwrap();
        assert_eq!(status, OptimizationStatus::Optimal);
        assert!((problem.variable_value("x").unwrap() - 2.).abs() < 1e-6);
        assert!((problem.variable_value("y").unwrap() - 1.).abs() < 1e-6);
        assert!((problem.objective_value().unwrap() - 5.).abs() < 1e-6);

        let diagnostics = problem.constraint_diagnostics().unwrap();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].name, "cap");
        assert!(diagnostics[0].slack.abs() < 1e-6);
        assert_eq!(diagnostics[1].sense, ConstraintSense::GreaterEqual);
        assert!(diagnostics[1].slack.abs() < 1e-6);
    }

    #[test]
    fn infeasible_incumbent_is_discarded() {
        let mut problem = small_problem();
        let mut solver = FixedSolver {
            result: incumbent(OptimizationStatus::TimeLimit, 3., 1.),
        };
        let status = problem
            .optimize(&mut solver, &SolverParameters::new())
            .unwrap();
        assert_eq!(status, OptimizationStatus::TimeLimit);
        assert_eq!(problem.solution_count(), 0);
        assert_eq!(problem.variable_values(), Err(ProblemError::NoSolution));
    }

    #[test]
    fn feasible_incumbent_is_kept() {
        let mut problem = small_problem();
        let mut solver = FixedSolver {
            result: incumbent(OptimizationStatus::Interrupted, 1., 1.),
        };
        problem
            .optimize(&mut solver, &SolverParameters::new())
            .unwrap();
        assert_eq!(problem.solution_count(), 1);
        assert!((problem.objective_value().unwrap() - 3.).abs() < 1e-9);
        let diagnostics = problem.constraint_diagnostics().unwrap();
        assert!((diagnostics[0].slack - 1.).abs() < 1e-9);
    }

    #[test]
    fn fractional_incumbent_is_not_feasible() {
        let problem = small_problem();
        let values: IndexMap<String, f64> = [("x".to_string(), 1.5), ("y".to_string(), 1.)]
            .into_iter()
            .collect();
        assert!(!problem.is_feasible(&values, 1e-6));
    }
}
