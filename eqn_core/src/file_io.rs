//! # File I/O Module
//!
//! Reads the three kinds of files the tool consumes, mapping every failure to
//! [`EqnError::FileError`] or [`EqnError::SerializationError`] with the path
//! attached:
//!
//! - **Source files**: plain text, any line ending
//! - **Unit configuration**: JSON, category → symbol → factor
//! - **Settings**: JSON, see [`crate::settings`]
//!
//! Results can be written back out as pretty JSON with an atomic
//! write-then-rename.
//!
//! ## Example
//!
//! ```rust,no_run
//! use eqn_core::file_io::{load_settings, load_unit_table, read_source};
//! use std::path::Path;
//!
//! let settings = load_settings(Path::new("equate.json"))?;
//! let units = load_unit_table(settings.units_path.as_deref())?;
//! let source = read_source(Path::new("beam.eqn"))?;
//! # Ok::<(), eqn_core::errors::EqnError>(())
//! ```

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::errors::{EqnError, EqnResult};
use crate::settings::Settings;
use crate::units::UnitTable;

fn io_error(operation: &str, path: &Path, e: io::Error) -> EqnError {
    EqnError::file_error(operation, path.display().to_string(), e.to_string())
}

fn read_to_string(path: &Path) -> EqnResult<String> {
    let mut contents = String::new();
    File::open(path)
        .map_err(|e| io_error("open", path, e))?
        .read_to_string(&mut contents)
        .map_err(|e| io_error("read", path, e))?;
    Ok(contents)
}

/// Read a source file.
///
/// # Errors
///
/// * `EqnError::FileError` - missing, unreadable, or not UTF-8
pub fn read_source(path: &Path) -> EqnResult<String> {
    let source = read_to_string(path)?;
    debug!(path = %path.display(), bytes = source.len(), "source loaded");
    Ok(source)
}

/// Load a unit table from `path`, or the bundled table when `None`.
///
/// # Errors
///
/// * `EqnError::FileError` - I/O error
/// * `EqnError::SerializationError` - invalid JSON
/// * `EqnError::Config` - valid JSON that is not a usable unit table
pub fn load_unit_table(path: Option<&Path>) -> EqnResult<UnitTable> {
    let Some(path) = path else {
        return UnitTable::bundled();
    };

    let contents = read_to_string(path)?;
    UnitTable::from_json_str(&contents).map_err(|e| with_path(e, path))
}

/// Name the file in serialization errors, which otherwise only carry a
/// line and column.
fn with_path(error: EqnError, path: &Path) -> EqnError {
    match error {
        EqnError::SerializationError { reason } => EqnError::SerializationError {
            reason: format!("{} ({})", reason, path.display()),
        },
        other => other,
    }
}

/// Load settings from a JSON file.
///
/// # Errors
///
/// * `EqnError::FileError` - I/O error
/// * `EqnError::SerializationError` - invalid JSON or unknown field
/// * `EqnError::Config` - values out of range
pub fn load_settings(path: &Path) -> EqnResult<Settings> {
    let contents = read_to_string(path)?;
    Settings::from_json_str(&contents).map_err(|e| with_path(e, path))
}

/// Write `value` as pretty JSON. Readers of `path` see either the old file
/// or the complete new one.
///
/// # Errors
///
/// * `EqnError::SerializationError` - the value cannot be encoded
/// * `EqnError::FileError` - the file cannot be written or replaced
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> EqnResult<()> {
    let mut json = serde_json::to_string_pretty(value).map_err(|e| EqnError::serialization(e.to_string()))?;
    json.push('\n');

    let staging = path.with_extension("json.tmp");
    let staged = File::create(&staging).and_then(|mut file| {
        file.write_all(json.as_bytes())?;
        file.sync_all()
    });
    if let Err(e) = staged.and_then(|()| fs::rename(&staging, path)) {
        let _ = fs::remove_file(&staging);
        return Err(io_error("write", path, e));
    }

    debug!(path = %path.display(), bytes = json.len(), "result written");
    Ok(())
}
