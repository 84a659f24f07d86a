//! # eqn_core - Equation System Preprocessor
//!
//! `eqn_core` turns loosely written systems of nonlinear equations into the
//! exact input a numeric root finder needs. Source text mixes four kinds of
//! lines:
//!
//! ```text
//! g: 9.8                     parameter, evaluated immediately
//! guess 2 for t              initial value for a variable
//! keep t on [0, 100]         admissible interval for a variable
//! h = g*t^2/2 [m->ft]        equation, with an inline unit conversion
//! ```
//!
//! Anything else is prose and is ignored.
//!
//! ## Design Philosophy
//!
//! - **Pure passes**: preprocessing is a fixed sequence of text rewrites with
//!   no I/O
//! - **JSON-First**: systems, requests and errors all serialize
//! - **Rich Errors**: every failure names the line or unit that caused it
//! - **Pluggable solver**: anything implementing [`solver::Solver`] can solve
//!
//! ## Quick Start
//!
//! ```rust
//! use eqn_core::{preprocess, UnitTable};
//!
//! let units = UnitTable::bundled().unwrap();
//! let system = preprocess("L: 12 [in->ft]\nA = L^2", &units).unwrap();
//!
//! assert_eq!(system.variables, vec!["A"]);
//! assert_eq!(system.guesses["A"], 1.0);
//! ```
//!
//! ## Modules
//!
//! - [`units`] - Unit catalog and conversion factor lookup
//! - [`scanner`] - Pattern extractors for tags, parameters and directives
//! - [`expr`] - Arithmetic evaluator for parameter expressions
//! - [`preprocess`] - The ordered preprocessing passes
//! - [`system`] - Resolved system, parameters and bounds
//! - [`solver`] - External solver contract and result merging
//! - [`settings`] - Tolerance, iteration limit and paths
//! - [`file_io`] - Reading sources and configuration
//! - [`errors`] - Structured error types

pub mod errors;
pub mod expr;
pub mod file_io;
pub mod preprocess;
pub mod scanner;
pub mod settings;
pub mod solver;
pub mod system;
pub mod units;

// Re-export commonly used types at crate root for convenience
pub use errors::{EqnError, EqnResult, PreprocessError};
pub use preprocess::{preprocess, Preprocessor};
pub use settings::Settings;
pub use solver::{ProcessSolver, SolveRequest, Solver, SolverAdapter, SolverConfig};
pub use system::{Bound, Parameter, ResolvedSystem, ResultMapping};
pub use units::{ConversionResolver, UnitTable};
