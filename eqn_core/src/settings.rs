//! # Settings
//!
//! Solver and unit configuration, read from a JSON document. Every field is
//! optional; missing fields take the defaults below.
//!
//! | Field             | Default        |
//! |-------------------|----------------|
//! | `tolerance`       | `1e-5`         |
//! | `iteration_limit` | `300`          |
//! | `units_path`      | bundled table  |
//! | `solver_command`  | none           |
//!
//! ```json
//! {
//!   "tolerance": 1e-8,
//!   "units_path": "units.json",
//!   "solver_command": ["python3", "mvnr_bridge.py"]
//! }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{EqnError, EqnResult};
use crate::solver::{SolverConfig, DEFAULT_ITERATION_LIMIT, DEFAULT_TOLERANCE};

/// Runtime settings for preprocessing and solving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub tolerance: f64,
    pub iteration_limit: u32,
    /// Unit configuration file; the bundled table when absent
    pub units_path: Option<PathBuf>,
    /// External solver command line, program first
    pub solver_command: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            tolerance: DEFAULT_TOLERANCE,
            iteration_limit: DEFAULT_ITERATION_LIMIT,
            units_path: None,
            solver_command: Vec::new(),
        }
    }
}

impl Settings {
    /// Parse settings from JSON text.
    ///
    /// # Errors
    ///
    /// * `EqnError::SerializationError` - not valid JSON or unknown field
    /// * `EqnError::Config` - values out of range
    pub fn from_json_str(text: &str) -> EqnResult<Self> {
        let settings: Settings = serde_json::from_str(text).map_err(|e| EqnError::SerializationError {
            reason: format!("Invalid settings: {}", e),
        })?;
        settings.solver_config().validate()?;
        Ok(settings)
    }

    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            tolerance: self.tolerance,
            iteration_limit: self.iteration_limit,
        }
    }
}
