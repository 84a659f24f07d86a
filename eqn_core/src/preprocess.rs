//! # Preprocessor
//!
//! Turns free-form source text into a [`ResolvedSystem`] in four passes. The
//! order matters: every pass rewrites the text the next one reads.
//!
//! 1. **Conversions** - each `[from->to]` tag becomes ` * <factor>`.
//! 2. **Parameters** - `name: expr` lines are evaluated top to bottom, blanked,
//!    and every later use of the name is replaced with `(<value>)`.
//! 3. **Directives** - `guess` and `keep` lines are extracted and blanked.
//! 4. **Equations** - remaining lines with `=` become equations; every
//!    identifier in them is a variable and gets a default guess of 1.0 unless
//!    one was given.
//!
//! Removed lines are blanked rather than deleted so line numbers in errors
//! always refer to the text the user wrote.
//!
//! ## Example
//!
//! ```rust
//! use eqn_core::preprocess::Preprocessor;
//! use eqn_core::units::UnitTable;
//!
//! let units = UnitTable::bundled().unwrap();
//! let system = Preprocessor::new(&units)
//!     .preprocess("g: 9.8\nh: 2*g\nm*h = F")
//!     .unwrap();
//!
//! assert_eq!(system.equations, vec!["m*(19.6) = F"]);
//! assert_eq!(system.guesses["m"], 1.0);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, debug_span, warn};

use crate::errors::{EqnResult, PreprocessError};
use crate::scanner;
use crate::system::{Bound, ParameterScope, ResolvedSystem};
use crate::units::{ConversionResolver, UnitTable};

/// Source-to-system compiler bound to one unit table.
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor<'a> {
    resolver: ConversionResolver<'a>,
}

impl<'a> Preprocessor<'a> {
    pub fn new(units: &'a UnitTable) -> Self {
        Preprocessor {
            resolver: units.resolver(),
        }
    }

    /// Run all passes over `source`.
    ///
    /// # Errors
    ///
    /// * `EqnError::Preprocess` - wrapping the first failure of any pass;
    ///   nothing partial is returned
    pub fn preprocess(&self, source: &str) -> EqnResult<ResolvedSystem> {
        Ok(self.run(source)?)
    }

    fn run(&self, source: &str) -> Result<ResolvedSystem, PreprocessError> {
        let span = debug_span!("preprocess", lines = source.lines().count());
        let _enter = span.enter();

        let text = self.resolve_conversions(source)?;
        let (text, scope) = extract_parameters(&text)?;
        let (text, guesses, bounds) = extract_directives(&text)?;
        collect_equations(&text, guesses, bounds, scope)
    }

    /// Pass 1: replace each conversion tag with an inline multiplier.
    pub fn resolve_conversions(&self, text: &str) -> Result<String, PreprocessError> {
        let tags = scanner::conversion_tags(text);
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for tag in &tags {
            let factor = self.resolver.resolve(tag.from, tag.to)?;
            out.push_str(&text[last..tag.start]);
            out.push_str(&format!(" * {}", factor));
            last = tag.end;
        }
        out.push_str(&text[last..]);

        debug!(tags = tags.len(), "conversion tags resolved");
        Ok(out)
    }
}

/// Run every pass with a fresh [`Preprocessor`] over `units`.
pub fn preprocess(source: &str, units: &UnitTable) -> EqnResult<ResolvedSystem> {
    Preprocessor::new(units).preprocess(source)
}

/// Pass 2: evaluate parameter lines, blank them, inline their values.
pub fn extract_parameters(text: &str) -> Result<(String, ParameterScope), PreprocessError> {
    let mut scope = ParameterScope::new();
    let mut consumed = BTreeSet::new();
    for param in scanner::parameter_lines(text) {
        scope.define(param.line, param.text, param.name, param.expression)?;
        consumed.insert(param.line);
    }
    let remaining = blank_lines(text, &consumed);

    for (i, line) in remaining.lines().enumerate() {
        check_names(i + 1, line, &scope)?;
    }

    let substituted = substitute_parameters(&remaining, &scope);
    debug!(parameters = scope.len(), "parameters evaluated");
    Ok((substituted, scope))
}

/// Name checks that substitution would hide.
///
/// A directive may not target a parameter, an equation may not be made of
/// parameters alone, and no name may be written against a number (`2x`).
fn check_names(line: usize, text: &str, scope: &ParameterScope) -> Result<(), PreprocessError> {
    if scanner::directive_kind(text).is_some() {
        return match scanner::directive_target(text) {
            Some(target) if scope.contains(target) => Err(PreprocessError::name_conflict(
                target,
                format!("line {} uses a parameter as a directive target", line),
            )),
            _ => Ok(()),
        };
    }
    if !text.contains('=') {
        return Ok(());
    }

    if let Some(name) = scanner::glued_identifier(text) {
        return Err(PreprocessError::malformed_equation(
            line,
            text.trim(),
            format!("missing operator before '{}'", name),
        ));
    }
    let names = scanner::identifiers(text);
    if let Some(&first) = names.first() {
        if names.iter().all(|name| scope.contains(name)) {
            return Err(PreprocessError::name_conflict(
                first,
                format!("line {} uses only parameters, leaving nothing to solve for", line),
            ));
        }
    }
    Ok(())
}

/// Replace every whole-token parameter name with its parenthesized value.
///
/// Applying this to already substituted text changes nothing.
pub fn substitute_parameters(text: &str, scope: &ParameterScope) -> String {
    scanner::substitute_identifiers(text, |name| scope.get(name).map(|value| format!("({})", value)))
}

type Directives = (String, BTreeMap<String, f64>, BTreeMap<String, Bound>);

/// Pass 3: pull out guess and bound directives.
pub fn extract_directives(text: &str) -> Result<Directives, PreprocessError> {
    let mut consumed = BTreeSet::new();

    let mut guesses = BTreeMap::new();
    for directive in scanner::guess_directives(text)? {
        consumed.insert(directive.line);
        if let Some(previous) = guesses.insert(directive.variable.clone(), directive.value) {
            debug!(
                variable = %directive.variable,
                previous,
                value = directive.value,
                "later guess replaces earlier one"
            );
        }
    }

    let mut bounds = BTreeMap::new();
    for directive in scanner::bound_directives(text)? {
        consumed.insert(directive.line);
        let bound = Bound::new(directive.low, directive.high).ok_or_else(|| {
            PreprocessError::malformed_directive(
                directive.line,
                format!("keep {} on [{}, {}]", directive.variable, directive.low, directive.high),
                "lower bound exceeds upper bound",
            )
        })?;
        bounds.insert(directive.variable, bound);
    }

    debug!(guesses = guesses.len(), bounds = bounds.len(), "directives extracted");
    Ok((blank_lines(text, &consumed), guesses, bounds))
}

/// Pass 4: gather equations and variables, fill default guesses.
fn collect_equations(
    text: &str,
    mut guesses: BTreeMap<String, f64>,
    mut bounds: BTreeMap<String, Bound>,
    scope: ParameterScope,
) -> Result<ResolvedSystem, PreprocessError> {
    let mut equations = Vec::new();
    let mut variables = Vec::new();
    let mut seen = HashSet::new();

    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || !line.contains('=') {
            continue;
        }
        check_equation(i + 1, line)?;

        for name in scanner::identifiers(line) {
            if seen.insert(name) {
                variables.push(name.to_string());
            }
        }
        equations.push(line.to_string());
    }

    guesses.retain(|name, _| {
        let used = seen.contains(name.as_str());
        if !used {
            warn!(variable = %name, "guess ignored: variable does not appear in any equation");
        }
        used
    });
    bounds.retain(|name, _| {
        let used = seen.contains(name.as_str());
        if !used {
            warn!(variable = %name, "bound ignored: variable does not appear in any equation");
        }
        used
    });
    for name in &variables {
        guesses.entry(name.clone()).or_insert(DEFAULT_GUESS);
    }

    debug!(
        equations = equations.len(),
        variables = variables.len(),
        "equations collected"
    );
    Ok(ResolvedSystem {
        equations,
        variables,
        guesses,
        bounds,
        parameters: scope.into_parameters(),
    })
}

/// Initial value for variables without a `guess` directive.
pub const DEFAULT_GUESS: f64 = 1.0;

fn check_equation(line: usize, text: &str) -> Result<(), PreprocessError> {
    let mut sides = text.split('=');
    let lhs = sides.next().unwrap_or_default();
    let rhs = sides.next().unwrap_or_default();
    if sides.next().is_some() {
        return Err(PreprocessError::malformed_equation(line, text, "expected exactly one '='"));
    }
    if lhs.trim().is_empty() || rhs.trim().is_empty() {
        return Err(PreprocessError::malformed_equation(line, text, "both sides of '=' must be non-empty"));
    }
    Ok(())
}

/// Replace the given 1-based lines with empty lines.
fn blank_lines(text: &str, lines: &BTreeSet<usize>) -> String {
    if lines.is_empty() {
        return text.to_string();
    }
    text.lines()
        .enumerate()
        .map(|(i, line)| if lines.contains(&(i + 1)) { "" } else { line })
        .collect::<Vec<_>>()
        .join("\n")
}
