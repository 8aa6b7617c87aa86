//! Provides struct for representing a constraint in an optimization problem
use std::fmt::{Display, Formatter};

use indexmap::IndexMap;

/// Represents a named linear constraint in an optimization problem,
/// `sum(terms) <sense> rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Used to identify the constraint, must be unique within a problem
    pub id: String,
    /// Linear terms which are added together, see [`ConstraintTerm`] for more
    pub terms: Vec<ConstraintTerm>,
    /// Relation between the terms and the right hand side
    pub sense: ConstraintSense,
    /// The right hand side of the constraint
    pub rhs: f64,
}

impl Constraint {
    /// Create a new constraint
    ///
    /// # Parameters
    /// - `id`: Identifier of the constraint
    /// - `variables`: A slice of variable ids
    /// - `coefficients`: A slice of coefficients for the variables
    /// - `sense`: Relation between the left and right hand side
    /// - `rhs`: The right hand side
    ///
    /// # Examples
    /// ```rust
    /// use runalloc_core::optimize::constraint::{Constraint, ConstraintSense};
    /// // represents 3*x + 2*y <= 6
    /// let cons = Constraint::new("limit", &["x", "y"], &[3.0, 2.0], ConstraintSense::LessEqual, 6.);
    /// assert_eq!(cons.to_string(), "3*x + 2*y <= 6");
    /// ```
    pub fn new(
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        sense: ConstraintSense,
        rhs: f64,
    ) -> Self {
        Constraint {
            id: id.to_string(),
            terms: Constraint::zip_into_terms(variables, coefficients),
            sense,
            rhs,
        }
    }

    /// Create a new `<=` constraint
    pub fn new_less_equal(id: &str, variables: &[&str], coefficients: &[f64], rhs: f64) -> Self {
        Self::new(id, variables, coefficients, ConstraintSense::LessEqual, rhs)
    }

    /// Create a new `>=` constraint
    pub fn new_greater_equal(id: &str, variables: &[&str], coefficients: &[f64], rhs: f64) -> Self {
        Self::new(id, variables, coefficients, ConstraintSense::GreaterEqual, rhs)
    }

    /// Create a new equality constraint
    pub fn new_equality(id: &str, variables: &[&str], coefficients: &[f64], equals: f64) -> Self {
        Self::new(id, variables, coefficients, ConstraintSense::Equal, equals)
    }

    /// Ids of the variables appearing in the constraint
    pub fn variable_ids(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|t| t.variable.as_str())
    }

    /// Lower and upper bound on the terms implied by the sense and right hand side
    pub fn bounds(&self) -> (f64, f64) {
        match self.sense {
            ConstraintSense::LessEqual => (f64::NEG_INFINITY, self.rhs),
            ConstraintSense::GreaterEqual => (self.rhs, f64::INFINITY),
            ConstraintSense::Equal => (self.rhs, self.rhs),
        }
    }

    /// Value of the terms for the given variable values
    ///
    /// Variables missing from `values` contribute nothing.
    pub fn activity(&self, values: &IndexMap<String, f64>) -> f64 {
        self.terms
            .iter()
            .map(|t| t.coefficient * values.get(&t.variable).copied().unwrap_or(0.0))
            .sum()
    }

    /// Slack of the constraint for the given variable values, `rhs - activity`
    ///
    /// Non-negative for a satisfied `<=`, non-positive for a satisfied `>=`,
    /// zero when the constraint is binding.
    pub fn slack(&self, values: &IndexMap<String, f64>) -> f64 {
        self.rhs - self.activity(values)
    }

    /// Whether the constraint holds (within `tolerance`) for the given variable values
    pub fn is_satisfied(&self, values: &IndexMap<String, f64>, tolerance: f64) -> bool {
        let slack = self.slack(values);
        match self.sense {
            ConstraintSense::LessEqual => slack >= -tolerance,
            ConstraintSense::GreaterEqual => slack <= tolerance,
            ConstraintSense::Equal => slack.abs() <= tolerance,
        }
    }

    /// Take a slice of variable ids, and a slice of coefficients and zip
    /// them together into a vec of ConstraintTerms
    fn zip_into_terms(variables: &[&str], coefficients: &[f64]) -> Vec<ConstraintTerm> {
        variables
            .iter()
            .zip(coefficients)
            .map(|(var, coef)| ConstraintTerm {
                variable: var.to_string(),
                coefficient: *coef,
            })
            .collect()
    }

    /// Convert a slice of terms into a String representation
    fn terms_to_string(terms: &[ConstraintTerm]) -> String {
        if terms.is_empty() {
            return "0".to_string();
        }
        terms
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            Self::terms_to_string(&self.terms),
            self.sense,
            self.rhs
        )
    }
}

/// Relation between the left and right hand side of a [`Constraint`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintSense {
    /// `terms <= rhs`
    LessEqual,
    /// `terms >= rhs`
    GreaterEqual,
    /// `terms = rhs`
    Equal,
}

impl Display for ConstraintSense {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintSense::LessEqual => write!(f, "<="),
            ConstraintSense::GreaterEqual => write!(f, ">="),
            ConstraintSense::Equal => write!(f, "="),
        }
    }
}

/// Represents a single term in a constraint, specifically
/// represents the multiplication of the `variable` by the `coefficient`
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintTerm {
    /// Id of the variable
    pub variable: String,
    /// The coefficient for the variable
    pub coefficient: f64,
}

impl Display for ConstraintTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}*{}", self.coefficient, self.variable)
    }
}
