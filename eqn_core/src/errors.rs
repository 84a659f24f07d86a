//! # Error Types
//!
//! Structured error types for eqn_core. Every failure carries enough context
//! (line numbers, offending text, unit symbols) for a caller to point the user
//! at the exact place in their source that needs fixing.
//!
//! Preprocessing failures are grouped under [`PreprocessError`] and surface
//! through [`EqnError::Preprocess`], so callers can match on "the text was
//! wrong" separately from configuration, I/O, or solver failures.
//!
//! ## Example
//!
//! ```rust
//! use eqn_core::errors::{EqnError, EqnResult, PreprocessError};
//!
//! fn require_bound(low: f64, high: f64) -> EqnResult<()> {
//!     if low > high {
//!         return Err(PreprocessError::malformed_directive(
//!             3,
//!             "keep x on [5, 1]",
//!             "lower bound exceeds upper bound",
//!         )
//!         .into());
//!     }
//!     Ok(())
//! }
//!
//! let err = require_bound(5.0, 1.0).unwrap_err();
//! assert_eq!(err.error_code(), "MALFORMED_DIRECTIVE");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for eqn_core operations
pub type EqnResult<T> = Result<T, EqnError>;

/// Top-level error type for loading, preprocessing and solving.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum EqnError {
    /// Unit configuration or solver settings are malformed
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// One of the preprocessing passes rejected the source text
    #[error("Preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),

    /// The external solver reported a failure
    #[error("Solver error: {message}")]
    Solve { message: String },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },
}

/// Failures raised while turning source text into a resolved system.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum PreprocessError {
    /// No unit category holds both symbols of a conversion tag
    #[error("No unit category contains both '{from}' and '{to}'")]
    UnitNotFound { from: String, to: String },

    /// Several categories hold both symbols and disagree on the factor
    #[error("Conversion '{from}' -> '{to}' is ambiguous across categories: {}", categories.join(", "))]
    AmbiguousUnit {
        from: String,
        to: String,
        categories: Vec<String>,
    },

    /// A parameter expression could not be evaluated
    #[error("Parameter on line {line} ('{text}'): {reason}")]
    ParameterEval {
        line: usize,
        text: String,
        reason: String,
    },

    /// A guess or bound directive is present but not well-formed
    #[error("Malformed directive on line {line} ('{text}'): {reason}")]
    MalformedDirective {
        line: usize,
        text: String,
        reason: String,
    },

    /// An equation line is not of the form `lhs = rhs`
    #[error("Malformed equation on line {line} ('{text}'): {reason}")]
    MalformedEquation {
        line: usize,
        text: String,
        reason: String,
    },

    /// A name is used both as a parameter and as something else
    #[error("Name conflict for '{name}': {reason}")]
    NameConflict { name: String, reason: String },
}

impl EqnError {
    /// Create a Config error
    pub fn config(reason: impl Into<String>) -> Self {
        EqnError::Config {
            reason: reason.into(),
        }
    }

    /// Create a Solve error
    pub fn solve(message: impl Into<String>) -> Self {
        EqnError::Solve {
            message: message.into(),
        }
    }

    /// Create a FileError
    pub fn file_error(operation: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        EqnError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization(reason: impl Into<String>) -> Self {
        EqnError::SerializationError {
            reason: reason.into(),
        }
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            EqnError::Config { .. } => "CONFIG_ERROR",
            EqnError::Preprocess(inner) => inner.error_code(),
            EqnError::Solve { .. } => "SOLVE_ERROR",
            EqnError::FileError { .. } => "FILE_ERROR",
            EqnError::SerializationError { .. } => "SERIALIZATION_ERROR",
        }
    }
}

impl PreprocessError {
    /// Create an UnitNotFound error
    pub fn unit_not_found(from: impl Into<String>, to: impl Into<String>) -> Self {
        PreprocessError::UnitNotFound {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create a ParameterEval error
    pub fn parameter_eval(line: usize, text: impl Into<String>, reason: impl Into<String>) -> Self {
        PreprocessError::ParameterEval {
            line,
            text: text.into(),
            reason: reason.into(),
        }
    }

    /// Create a MalformedDirective error
    pub fn malformed_directive(line: usize, text: impl Into<String>, reason: impl Into<String>) -> Self {
        PreprocessError::MalformedDirective {
            line,
            text: text.into(),
            reason: reason.into(),
        }
    }

    /// Create a MalformedEquation error
    pub fn malformed_equation(line: usize, text: impl Into<String>, reason: impl Into<String>) -> Self {
        PreprocessError::MalformedEquation {
            line,
            text: text.into(),
            reason: reason.into(),
        }
    }

    /// Create a NameConflict error
    pub fn name_conflict(name: impl Into<String>, reason: impl Into<String>) -> Self {
        PreprocessError::NameConflict {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Source line the error points at, when it has one
    pub fn line(&self) -> Option<usize> {
        match self {
            PreprocessError::ParameterEval { line, .. }
            | PreprocessError::MalformedDirective { line, .. }
            | PreprocessError::MalformedEquation { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            PreprocessError::UnitNotFound { .. } => "UNIT_NOT_FOUND",
            PreprocessError::AmbiguousUnit { .. } => "AMBIGUOUS_UNIT",
            PreprocessError::ParameterEval { .. } => "PARAMETER_EVAL",
            PreprocessError::MalformedDirective { .. } => "MALFORMED_DIRECTIVE",
            PreprocessError::MalformedEquation { .. } => "MALFORMED_EQUATION",
            PreprocessError::NameConflict { .. } => "NAME_CONFLICT",
        }
    }
}
