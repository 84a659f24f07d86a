//! # Equate CLI
//!
//! Command-line front end for `eqn_core`.
//!
//! ```text
//! equate emit beam.eqn                      # resolved system as JSON
//! equate emit beam.eqn --request            # exact solver request
//! equate solve beam.eqn --solver python3 mvnr_bridge.py
//! ```
//!
//! Results go to stdout as JSON; logs and errors go to stderr. Set
//! `RUST_LOG` or pass `--verbose` for pass-by-pass logging.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use eqn_core::file_io::{load_settings, load_unit_table, read_source, write_json};
use eqn_core::{preprocess, EqnError, EqnResult, ProcessSolver, Settings, SolveRequest, SolverAdapter};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "equate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Preprocess and solve systems of nonlinear equations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Preprocess a source file and print the result without solving
    Emit {
        #[command(flatten)]
        common: CommonArgs,

        /// Print the solver request instead of the resolved system
        #[arg(long)]
        request: bool,
    },

    /// Preprocess a source file and solve it with an external solver
    Solve {
        #[command(flatten)]
        common: CommonArgs,

        /// Solver command line, program first (overrides settings)
        #[arg(long, value_name = "CMD", num_args = 1..)]
        solver: Vec<String>,

        /// Convergence tolerance (overrides settings)
        #[arg(long)]
        tolerance: Option<f64>,

        /// Iteration limit (overrides settings)
        #[arg(long)]
        iterations: Option<u32>,

        /// Also write the result mapping to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Source file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Unit configuration (overrides settings)
    #[arg(long, value_name = "FILE")]
    units: Option<PathBuf>,

    /// Settings file
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let outcome = match cli.command {
        Commands::Emit { common, request } => emit(&common, request),
        Commands::Solve {
            common,
            solver,
            tolerance,
            iterations,
            output,
        } => solve(&common, solver, tolerance, iterations, output.as_deref()),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            if let Ok(json) = serde_json::to_string(&err) {
                eprintln!("{}", json);
            }
            ExitCode::FAILURE
        }
    }
}

fn load_settings_or_default(path: Option<&Path>) -> EqnResult<Settings> {
    match path {
        Some(path) => load_settings(path),
        None => Ok(Settings::default()),
    }
}

fn print_json<T: Serialize>(value: &T) -> EqnResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| EqnError::serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn emit(common: &CommonArgs, request: bool) -> EqnResult<()> {
    let settings = load_settings_or_default(common.settings.as_deref())?;
    let units = load_unit_table(common.units.as_deref().or(settings.units_path.as_deref()))?;
    let source = read_source(&common.input)?;

    let system = preprocess(&source, &units)?;
    if system.degrees_of_freedom() != 0 {
        tracing::warn!(
            equations = system.equations.len(),
            variables = system.variables.len(),
            "system is not square"
        );
    }

    if request {
        print_json(&SolveRequest::new(&system, settings.solver_config()))
    } else {
        print_json(&system)
    }
}

fn solve(
    common: &CommonArgs,
    solver: Vec<String>,
    tolerance: Option<f64>,
    iterations: Option<u32>,
    output: Option<&Path>,
) -> EqnResult<()> {
    let settings = load_settings_or_default(common.settings.as_deref())?;
    let units = load_unit_table(common.units.as_deref().or(settings.units_path.as_deref()))?;
    let source = read_source(&common.input)?;

    let command = if solver.is_empty() { settings.solver_command.clone() } else { solver };
    if command.is_empty() {
        return Err(EqnError::config("no solver command given; pass --solver or set solver_command"));
    }
    let solver = ProcessSolver::from_command(&command)?;

    let mut config = settings.solver_config();
    if let Some(tolerance) = tolerance {
        config.tolerance = tolerance;
    }
    if let Some(iterations) = iterations {
        config.iteration_limit = iterations;
    }
    config.validate()?;

    let system = preprocess(&source, &units)?;
    tracing::info!(solver = solver.program(), "solving");
    let result = SolverAdapter::new(solver, config).invoke(&system)?;

    if let Some(path) = output {
        write_json(&result, path)?;
    }
    print_json(&result)
}
