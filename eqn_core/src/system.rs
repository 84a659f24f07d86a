//! # Resolved System
//!
//! Data produced by preprocessing and consumed by the solver adapter.
//!
//! ```text
//! ResolvedSystem
//! ├── equations:  ["m*(19.6) = F", ...]      (two-sided, solver-ready)
//! ├── variables:  ["m", "F", ...]             (first-appearance order)
//! ├── guesses:    { F: 1.0, m: 5.0 }          (one per variable)
//! ├── bounds:     { m: [0, 100] }             (explicit only)
//! └── parameters: [g = 9.8, h = 19.6]         (definition order)
//! ```
//!
//! Everything serializes to JSON so a system can be inspected or handed to
//! another process as-is.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::errors::PreprocessError;
use crate::expr::evaluate;
use crate::scanner;

/// Final mapping handed back to callers: variable or parameter name to value.
pub type ResultMapping = BTreeMap<String, f64>;

/// A named constant evaluated from earlier parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
    /// Defining expression as written (after unit conversion)
    pub expression: String,
    /// 1-based source line
    pub line: usize,
}

/// Inclusive admissible interval for a variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub low: f64,
    pub high: f64,
}

impl Bound {
    /// Returns `None` when `low > high` or either end is NaN.
    pub fn new(low: f64, high: f64) -> Option<Self> {
        (low <= high).then_some(Bound { low, high })
    }

    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }

    /// `[low, high]`, the shape the solver expects
    pub fn as_array(&self) -> [f64; 2] {
        [self.low, self.high]
    }
}

/// Ordered, append-only parameter scope.
///
/// Each definition is evaluated against the parameters defined before it;
/// names cannot be redefined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterScope {
    parameters: Vec<Parameter>,
    index: HashMap<String, usize>,
}

impl ParameterScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate `expression` in the current scope and append it as `name`.
    ///
    /// # Errors
    ///
    /// * `PreprocessError::ParameterEval` - the name is not an identifier, or
    ///   the expression has a syntax error, unknown symbol, or arithmetic fault
    /// * `PreprocessError::NameConflict` - the name is reserved or already defined
    pub fn define(&mut self, line: usize, text: &str, name: &str, expression: &str) -> Result<f64, PreprocessError> {
        if !scanner::is_identifier(name) {
            return Err(PreprocessError::parameter_eval(
                line,
                text,
                format!("parameter name '{}' is not an identifier", name),
            ));
        }
        if scanner::is_reserved(name) {
            return Err(PreprocessError::name_conflict(
                name,
                format!("line {} defines a parameter with a reserved name", line),
            ));
        }
        if let Some(existing) = self.get_parameter(name) {
            return Err(PreprocessError::name_conflict(
                name,
                format!("line {} redefines the parameter from line {}", line, existing.line),
            ));
        }

        let value = evaluate(expression, |symbol| self.get(symbol))
            .map_err(|e| PreprocessError::parameter_eval(line, text, e.to_string()))?;

        self.index.insert(name.to_string(), self.parameters.len());
        self.parameters.push(Parameter {
            name: name.to_string(),
            value,
            expression: expression.to_string(),
            line,
        });
        Ok(value)
    }

    /// Rebuild a scope from recorded parameters, re-evaluating every expression.
    pub fn replay(parameters: &[Parameter]) -> Result<Self, PreprocessError> {
        let mut scope = ParameterScope::new();
        for p in parameters {
            let text = format!("{}: {}", p.name, p.expression);
            scope.define(p.line, &text, &p.name, &p.expression)?;
        }
        Ok(scope)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.get_parameter(name).map(|p| p.value)
    }

    pub fn get_parameter(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&i| &self.parameters[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn into_parameters(self) -> Vec<Parameter> {
        self.parameters
    }
}

/// Solver-ready system produced by the preprocessor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSystem {
    pub equations: Vec<String>,
    pub variables: Vec<String>,
    pub guesses: BTreeMap<String, f64>,
    pub bounds: BTreeMap<String, Bound>,
    pub parameters: Vec<Parameter>,
}

impl ResolvedSystem {
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Parameter values keyed by name
    pub fn parameter_values(&self) -> ResultMapping {
        self.parameters.iter().map(|p| (p.name.clone(), p.value)).collect()
    }

    /// True when there is nothing to solve
    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }

    /// Variable count minus equation count; zero for a square system.
    pub fn degrees_of_freedom(&self) -> isize {
        self.variables.len() as isize - self.equations.len() as isize
    }
}
