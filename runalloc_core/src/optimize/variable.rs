//! Module providing representation of optimization problem variables
use std::fmt::{Display, Formatter};

use derive_builder::Builder;

/// A decision variable of an optimization problem
#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(setter(into))]
pub struct Variable {
    /// Used to identify the variable, must be unique within a problem
    pub id: String,
    /// Human readable variable name
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Domain of the variable (see [`VariableType`])
    #[builder(default = "VariableType::Continuous")]
    pub variable_type: VariableType,
    /// Lowest value the variable can take
    #[builder(default = "0.0")]
    pub lower_bound: f64,
    /// Highest value the variable can take
    #[builder(default = "f64::INFINITY")]
    pub upper_bound: f64,
    /// Position of the variable in the problem, set when it is added
    #[builder(default = "0")]
    pub(crate) index: usize,
}

impl Variable {
    /// Create a new non-negative integer variable with no upper bound
    pub fn new_non_negative_integer(id: &str) -> Variable {
        Variable {
            id: id.to_string(),
            name: None,
            variable_type: VariableType::Integer,
            lower_bound: 0.0,
            upper_bound: f64::INFINITY,
            index: 0,
        }
    }

    /// Position of the variable within its problem
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether `value` lies within the bounds (and domain) of this variable
    pub(crate) fn admits(&self, value: f64, tolerance: f64) -> bool {
        if value < self.lower_bound - tolerance || value > self.upper_bound + tolerance {
            return false;
        }
        match self.variable_type {
            VariableType::Continuous => true,
            VariableType::Integer | VariableType::Binary => (value - value.round()).abs() <= tolerance,
        }
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}:{}", name, self.variable_type),
            None => write!(f, "{}:{}", self.id, self.variable_type),
        }
    }
}

/// Represents the type of variable in an optimization problem
///
/// # Notes:
/// Not all variable types are supported by every solver backend
#[derive(Debug, PartialEq, Clone, Copy, Hash, Eq)]
pub enum VariableType {
    /// Continuous variable
    Continuous,
    /// Integer variable
    Integer,
    /// Binary Variable
    Binary,
}

impl Display for VariableType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableType::Continuous => write!(f, "CONTINUOUS"),
            VariableType::Integer => write!(f, "INTEGER"),
            VariableType::Binary => write!(f, "BINARY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_variable() {
        let var = VariableBuilder::default()
            .id("x")
            .variable_type(VariableType::Integer)
            .upper_bound(4.0)
            .build()
            .unwrap();
        assert_eq!(var.id, "x");
        assert!((var.lower_bound - 0.0).abs() < 1e-25);
        assert!((var.upper_bound - 4.0).abs() < 1e-25);
        assert_eq!(format!("{}", var), "x:INTEGER");
    }

    #[test]
    fn integer_admits() {
        let var = Variable::new_non_negative_integer("runs[d1,s1]");
        assert!(var.admits(3.0, 1e-6));
        assert!(var.admits(2.9999999, 1e-6));
        assert!(!var.admits(2.5, 1e-6));
        assert!(!var.admits(-1.0, 1e-6));
    }
}
