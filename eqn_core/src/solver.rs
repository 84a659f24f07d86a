//! # Solver Adapter
//!
//! Packages a [`ResolvedSystem`] into the call contract of an external
//! nonlinear solver and merges its answer with the parameter values computed
//! during preprocessing.
//!
//! ## Call Contract
//!
//! Request (one JSON document):
//!
//! ```json
//! {
//!   "equations": ["x^2 = 9"],
//!   "guesses": { "x": 5.0 },
//!   "bounds": { "x": [0.0, 10.0] },
//!   "tolerance": 1e-5,
//!   "iteration_limit": 300
//! }
//! ```
//!
//! Reply: `{"solution": {"x": 3.0}}` or `{"error": "did not converge"}`.
//!
//! ## Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use eqn_core::solver::{SolveRequest, SolverAdapter, SolverConfig};
//! use eqn_core::preprocess::preprocess;
//! use eqn_core::units::UnitTable;
//!
//! let units = UnitTable::bundled().unwrap();
//! let system = preprocess("g: 9.8\ny = 2*g", &units).unwrap();
//!
//! let solver = |request: &SolveRequest| -> Result<BTreeMap<String, f64>, String> {
//!     assert_eq!(request.equations, vec!["y = 2*(9.8)"]);
//!     Ok(BTreeMap::from([("y".to_string(), 19.6)]))
//! };
//! let result = SolverAdapter::new(solver, SolverConfig::default())
//!     .invoke(&system)
//!     .unwrap();
//!
//! assert_eq!(result["g"], 9.8);
//! assert_eq!(result["y"], 19.6);
//! ```

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn};

use crate::errors::{EqnError, EqnResult};
use crate::system::{Bound, ResolvedSystem, ResultMapping};

/// Default convergence tolerance
pub const DEFAULT_TOLERANCE: f64 = 1e-5;

/// Default iteration cap
pub const DEFAULT_ITERATION_LIMIT: u32 = 300;

/// Convergence settings passed through to the solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub tolerance: f64,
    pub iteration_limit: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            tolerance: DEFAULT_TOLERANCE,
            iteration_limit: DEFAULT_ITERATION_LIMIT,
        }
    }
}

impl SolverConfig {
    /// # Errors
    ///
    /// * `EqnError::Config` - tolerance is not a positive finite number, or
    ///   the iteration limit is zero
    pub fn validate(&self) -> EqnResult<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(EqnError::config(format!(
                "tolerance must be a positive finite number, got {}",
                self.tolerance
            )));
        }
        if self.iteration_limit == 0 {
            return Err(EqnError::config("iteration limit must be at least 1"));
        }
        Ok(())
    }
}

/// Everything the external solver needs for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveRequest {
    pub equations: Vec<String>,
    pub guesses: BTreeMap<String, f64>,
    /// `[low, high]` per bounded variable
    pub bounds: BTreeMap<String, [f64; 2]>,
    pub tolerance: f64,
    pub iteration_limit: u32,
}

impl SolveRequest {
    pub fn new(system: &ResolvedSystem, config: SolverConfig) -> Self {
        SolveRequest {
            equations: system.equations.clone(),
            guesses: system.guesses.clone(),
            bounds: system
                .bounds
                .iter()
                .map(|(name, bound)| (name.clone(), bound.as_array()))
                .collect(),
            tolerance: config.tolerance,
            iteration_limit: config.iteration_limit,
        }
    }
}

/// Reply from an external solver process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveResponse {
    Solution(BTreeMap<String, f64>),
    Error(String),
}

impl SolveResponse {
    pub fn into_result(self) -> Result<BTreeMap<String, f64>, String> {
        match self {
            SolveResponse::Solution(solution) => Ok(solution),
            SolveResponse::Error(message) => Err(message),
        }
    }
}

/// A numeric root finder for systems of equations.
///
/// Failures are returned as the solver's own diagnostic text.
pub trait Solver {
    fn solve(&self, request: &SolveRequest) -> Result<BTreeMap<String, f64>, String>;
}

impl<F> Solver for F
where
    F: Fn(&SolveRequest) -> Result<BTreeMap<String, f64>, String>,
{
    fn solve(&self, request: &SolveRequest) -> Result<BTreeMap<String, f64>, String> {
        self(request)
    }
}

/// Runs an external command that speaks the JSON call contract over
/// stdin/stdout.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSolver {
    program: String,
    args: Vec<String>,
}

impl ProcessSolver {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        ProcessSolver {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from a full command line, program first.
    ///
    /// # Errors
    ///
    /// * `EqnError::Config` - the command is empty
    pub fn from_command(command: &[String]) -> EqnResult<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| EqnError::config("solver command is empty"))?;
        Ok(ProcessSolver::new(program.clone(), args.iter().cloned()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(&self, input: &[u8]) -> Result<Vec<u8>, String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to start '{}': {}", self.program, e))?;

        // The child may fill stdout before it has read all of stdin.
        let stdin = child.stdin.take();
        let (written, output) = thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(input),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("request writer panicked")));
            (written, output)
        });

        let output = output.map_err(|e| format!("failed to wait for '{}': {}", self.program, e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("'{}' exited with {}: {}", self.program, output.status, stderr.trim()));
        }
        written.map_err(|e| format!("failed to write request to '{}': {}", self.program, e))?;
        Ok(output.stdout)
    }
}

impl Solver for ProcessSolver {
    fn solve(&self, request: &SolveRequest) -> Result<BTreeMap<String, f64>, String> {
        let input = serde_json::to_vec(request).map_err(|e| format!("failed to encode request: {}", e))?;
        let stdout = self.run(&input)?;
        let response: SolveResponse = serde_json::from_slice(&stdout)
            .map_err(|e| format!("unreadable reply from '{}': {}", self.program, e))?;
        response.into_result()
    }
}

/// Hands resolved systems to a [`Solver`] and merges the answer with the
/// system's parameters.
pub struct SolverAdapter<S> {
    solver: S,
    config: SolverConfig,
}

impl<S: Solver> SolverAdapter<S> {
    pub fn new(solver: S, config: SolverConfig) -> Self {
        SolverAdapter { solver, config }
    }

    /// Solve with the adapter's own configuration.
    ///
    /// # Returns
    ///
    /// Parameters and solved variables in one mapping. A solved variable
    /// replaces a parameter of the same name.
    ///
    /// # Errors
    ///
    /// * `EqnError::Config` - the configuration is invalid
    /// * `EqnError::Solve` - the system is empty or the solver failed
    pub fn invoke(&self, system: &ResolvedSystem) -> EqnResult<ResultMapping> {
        self.call(system, self.config)
    }

    /// Solve with a one-off tolerance and iteration limit.
    pub fn invoke_with(&self, system: &ResolvedSystem, tolerance: f64, iteration_limit: u32) -> EqnResult<ResultMapping> {
        self.call(
            system,
            SolverConfig {
                tolerance,
                iteration_limit,
            },
        )
    }

    fn call(&self, system: &ResolvedSystem, config: SolverConfig) -> EqnResult<ResultMapping> {
        config.validate()?;
        if system.is_empty() {
            return Err(EqnError::solve("no equations to solve"));
        }

        let span = info_span!(
            "solve",
            equations = system.equations.len(),
            variables = system.variables.len()
        );
        let _enter = span.enter();

        if system.degrees_of_freedom() != 0 {
            debug!(
                degrees_of_freedom = system.degrees_of_freedom(),
                "system is not square"
            );
        }

        let request = SolveRequest::new(system, config);
        let solution = self.solver.solve(&request).map_err(EqnError::solve)?;
        debug!(solved = solution.len(), "solver returned");
        for name in violated_bounds(&system.bounds, &solution) {
            warn!(variable = %name, value = solution[name], "solved value lies outside its bound");
        }

        Ok(merge(system.parameter_values(), solution))
    }
}

/// Solved variables whose value falls outside their `keep` interval.
fn violated_bounds<'a>(bounds: &'a BTreeMap<String, Bound>, solution: &BTreeMap<String, f64>) -> Vec<&'a str> {
    bounds
        .iter()
        .filter(|(name, bound)| solution.get(*name).is_some_and(|&value| !bound.contains(value)))
        .map(|(name, _)| name.as_str())
        .collect()
}

/// Overlay `solution` on `parameters`; solution values win.
pub fn merge(parameters: ResultMapping, solution: BTreeMap<String, f64>) -> ResultMapping {
    let mut merged = parameters;
    for (name, value) in solution {
        if let Some(previous) = merged.insert(name.clone(), value) {
            warn!(name = %name, parameter = previous, solved = value, "solved variable shadows a parameter");
        }
    }
    merged
}
