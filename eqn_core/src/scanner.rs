//! # Directive Scanner
//!
//! Independent pattern extractors over source text. Each function scans the
//! whole text and returns its matches in source order with 1-based line
//! numbers; none of them mutate the text or share state.
//!
//! | Extractor            | Shape                                   |
//! |----------------------|-----------------------------------------|
//! | [`conversion_tags`]  | `[psi->kPa]`                            |
//! | [`parameter_lines`]  | `name: expression`                      |
//! | [`guess_directives`] | `guess -2.5 for x`                      |
//! | [`bound_directives`] | `keep x on [-10, 10]`                   |
//! | [`identifiers`]      | identifier tokens (variables, names)    |
//!
//! Keywords are matched case-insensitively. A line whose first word is
//! `guess` or `keep` is always treated as a directive and must be well-formed.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::PreprocessError;

/// Functions the external solver evaluates inside equations.
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "sqrt", "exp", "ln", "log", "abs", "sin", "cos", "tan", "asin", "acos", "atan", "atan2", "sinh", "cosh",
    "tanh", "asinh", "acosh", "atanh", "floor", "ceil", "round", "signum", "max", "min",
];

/// Named constants the external solver provides.
pub const BUILTIN_CONSTANTS: &[&str] = &["pi", "e"];

/// Words with meaning inside directive lines.
pub const DIRECTIVE_KEYWORDS: &[&str] = &["guess", "for", "keep", "on"];

static CONVERSION_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[([a-z0-9_/^\-]+)->([a-z0-9_/^\-]+)\]").expect("conversion tag pattern")
});

static GUESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*guess\s+([+-]?(?:\d+\.?\d*|\.\d+)(?:e[+-]?\d+)?)\s+for\s+([a-z_][a-z0-9_]*)\s*$")
        .expect("guess directive pattern")
});

static BOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*keep\s+([a-z_][a-z0-9_]*)\s+on\s+\[\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:e[+-]?\d+)?)\s*,\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:e[+-]?\d+)?)\s*\]\s*$",
    )
    .expect("bound directive pattern")
});

static DIRECTIVE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(guess|keep)\b").expect("directive keyword pattern"));

static GUESS_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*guess\b.*\bfor\s+([a-z_][a-z0-9_]*)").expect("guess target pattern"));

static KEEP_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*keep\s+([a-z_][a-z0-9_]*)").expect("keep target pattern"));

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("identifier pattern"));

/// Which directive a line starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Guess,
    Keep,
}

/// An inline `[from->to]` conversion annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTag<'a> {
    pub line: usize,
    /// Byte range of the whole tag within the scanned text
    pub start: usize,
    pub end: usize,
    pub from: &'a str,
    pub to: &'a str,
}

/// A `name: expression` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterLine<'a> {
    pub line: usize,
    /// Full line, trimmed
    pub text: &'a str,
    pub name: &'a str,
    pub expression: &'a str,
}

/// `guess <value> for <variable>`
#[derive(Debug, Clone, PartialEq)]
pub struct GuessDirective {
    pub line: usize,
    pub variable: String,
    pub value: f64,
}

/// `keep <variable> on [<low>, <high>]`
#[derive(Debug, Clone, PartialEq)]
pub struct BoundDirective {
    pub line: usize,
    pub variable: String,
    pub low: f64,
    pub high: f64,
}

/// Whether `text` is a single identifier token.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// Names a parameter may not take.
pub fn is_reserved(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    DIRECTIVE_KEYWORDS.contains(&lower.as_str())
        || BUILTIN_FUNCTIONS.contains(&name)
        || BUILTIN_CONSTANTS.contains(&name)
}

/// Directive keyword that opens `line`, if any.
pub fn directive_kind(line: &str) -> Option<DirectiveKind> {
    let caps = DIRECTIVE_START.captures(line)?;
    if caps[1].eq_ignore_ascii_case("guess") {
        Some(DirectiveKind::Guess)
    } else {
        Some(DirectiveKind::Keep)
    }
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].bytes().filter(|&b| b == b'\n').count() + 1
}

/// Every conversion tag in `text`, in source order.
pub fn conversion_tags(text: &str) -> Vec<ConversionTag<'_>> {
    CONVERSION_TAG
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(ConversionTag {
                line: line_of(text, whole.start()),
                start: whole.start(),
                end: whole.end(),
                from: caps.get(1)?.as_str(),
                to: caps.get(2)?.as_str(),
            })
        })
        .collect()
}

/// Every line containing `:`, split on the first `:`.
pub fn parameter_lines(text: &str) -> Vec<ParameterLine<'_>> {
    text.lines()
        .enumerate()
        .filter_map(|(i, raw)| {
            let (name, expression) = raw.split_once(':')?;
            Some(ParameterLine {
                line: i + 1,
                text: raw.trim(),
                name: name.trim(),
                expression: expression.trim(),
            })
        })
        .collect()
}

/// Every `guess` directive in `text`.
///
/// # Errors
///
/// * `PreprocessError::MalformedDirective` - a line starts with `guess` but
///   does not read `guess <number> for <variable>`
pub fn guess_directives(text: &str) -> Result<Vec<GuessDirective>, PreprocessError> {
    let mut out = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        if directive_kind(raw) != Some(DirectiveKind::Guess) {
            continue;
        }
        let line = i + 1;
        let caps = GUESS.captures(raw).ok_or_else(|| {
            PreprocessError::malformed_directive(line, raw.trim(), "expected 'guess <number> for <variable>'")
        })?;
        let value = parse_number(&caps[1], line, raw)?;
        out.push(GuessDirective {
            line,
            variable: caps[2].to_string(),
            value,
        });
    }
    Ok(out)
}

/// Every `keep` directive in `text`.
///
/// # Errors
///
/// * `PreprocessError::MalformedDirective` - a line starts with `keep` but
///   does not read `keep <variable> on [<low>, <high>]`, or `low > high`
pub fn bound_directives(text: &str) -> Result<Vec<BoundDirective>, PreprocessError> {
    let mut out = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        if directive_kind(raw) != Some(DirectiveKind::Keep) {
            continue;
        }
        let line = i + 1;
        let caps = BOUND.captures(raw).ok_or_else(|| {
            PreprocessError::malformed_directive(line, raw.trim(), "expected 'keep <variable> on [<low>, <high>]'")
        })?;
        let low = parse_number(&caps[2], line, raw)?;
        let high = parse_number(&caps[3], line, raw)?;
        if low > high {
            return Err(PreprocessError::malformed_directive(
                line,
                raw.trim(),
                format!("lower bound {} exceeds upper bound {}", low, high),
            ));
        }
        out.push(BoundDirective {
            line,
            variable: caps[1].to_string(),
            low,
            high,
        });
    }
    Ok(out)
}

fn parse_number(literal: &str, line: usize, raw: &str) -> Result<f64, PreprocessError> {
    literal
        .parse::<f64>()
        .map_err(|_| PreprocessError::malformed_directive(line, raw.trim(), format!("invalid number '{}'", literal)))
}

/// Whether the identifier-shaped token at `start..end` is the exponent of a
/// numeric literal: `e5` in `1e5`, or `e` in `2.5e-3`.
fn is_exponent_tail(text: &str, start: usize, end: usize) -> bool {
    if !follows_number(text, start) {
        return false;
    }
    let Some(rest) = text[start..end].strip_prefix(['e', 'E']) else {
        return false;
    };
    if !rest.is_empty() {
        return rest.bytes().all(|b| b.is_ascii_digit());
    }
    matches!(text[end..].as_bytes(), [b'+' | b'-', digit, ..] if digit.is_ascii_digit())
}

fn follows_number(text: &str, start: usize) -> bool {
    start > 0 && {
        let prev = text.as_bytes()[start - 1];
        prev.is_ascii_digit() || prev == b'.'
    }
}

/// Identifier tokens with their byte ranges, skipping exponent tails.
fn identifier_spans(text: &str) -> impl Iterator<Item = (usize, usize)> + '_ {
    IDENTIFIER
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .filter(move |&(start, end)| !is_exponent_tail(text, start, end))
}

/// First identifier written directly against a number, like the `x` in `2x`.
///
/// Exponent tails (`1e5`, `2.5E-3`) are not reported.
pub fn glued_identifier(text: &str) -> Option<&str> {
    identifier_spans(text)
        .find(|&(start, _)| follows_number(text, start))
        .map(|(start, end)| &text[start..end])
}

/// Variable named by a `guess` or `keep` line, if the line names one.
///
/// Works on lines that are not otherwise well-formed, so `keep x on [0, L]`
/// still reports `x`.
pub fn directive_target(line: &str) -> Option<&str> {
    let pattern = match directive_kind(line)? {
        DirectiveKind::Guess => &*GUESS_TARGET,
        DirectiveKind::Keep => &*KEEP_TARGET,
    };
    pattern.captures(line).and_then(|caps| caps.get(1)).map(|m| m.as_str())
}

/// Identifier tokens that name variables or parameters, in source order.
///
/// Builtin function calls (`sin(x)`) and builtin constants are skipped.
/// Duplicates are kept; callers deduplicate as they need.
pub fn identifiers(text: &str) -> Vec<&str> {
    identifier_spans(text)
        .filter_map(|(start, end)| {
            let name = &text[start..end];
            if BUILTIN_CONSTANTS.contains(&name) {
                return None;
            }
            let is_call = text[end..].trim_start().starts_with('(');
            if is_call && BUILTIN_FUNCTIONS.contains(&name) {
                return None;
            }
            Some(name)
        })
        .collect()
}

/// Replace whole identifier tokens for which `replacement` returns a value.
///
/// Tokens that are not replaced are copied through unchanged, as is all other
/// text.
pub fn substitute_identifiers<F>(text: &str, replacement: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, end) in identifier_spans(text) {
        if let Some(value) = replacement(&text[start..end]) {
            out.push_str(&text[last..start]);
            out.push_str(&value);
            last = end;
        }
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_tags() {
        let text = "F = m*a [kg-m/s^2->lbf]\nL = 3 [m->ft] + 2 [in->FT]";
        let tags = conversion_tags(text);
        assert_eq!(tags.len(), 3);
        assert_eq!((tags[0].from, tags[0].to, tags[0].line), ("kg-m/s^2", "lbf", 1));
        assert_eq!((tags[1].from, tags[1].to, tags[1].line), ("m", "ft", 2));
        assert_eq!(tags[2].to, "FT");
        assert_eq!(&text[tags[1].start..tags[1].end], "[m->ft]");
    }

    #[test]
    fn test_bound_brackets_are_not_conversion_tags() {
        assert!(conversion_tags("keep x on [-10, 10]").is_empty());
    }

    #[test]
    fn test_parameter_lines() {
        let params = parameter_lines("g: 9.8\nx = 2\n  h :2*g ");
        assert_eq!(params.len(), 2);
        assert_eq!((params[0].line, params[0].name, params[0].expression), (1, "g", "9.8"));
        assert_eq!((params[1].line, params[1].name, params[1].expression), (3, "h", "2*g"));
        assert_eq!(params[1].text, "h :2*g");
    }

    #[test]
    fn test_guess_directives() {
        let guesses = guess_directives("GUESS -2.5 for x\ny = x\nguess 3e2 for y_1").unwrap();
        assert_eq!(guesses.len(), 2);
        assert_eq!(guesses[0], GuessDirective { line: 1, variable: "x".to_string(), value: -2.5 });
        assert_eq!(guesses[1].variable, "y_1");
        assert_eq!(guesses[1].value, 300.0);
        assert_eq!(guesses[1].line, 3);
    }

    #[test]
    fn test_malformed_guess() {
        let err = guess_directives("guess x for 5").unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_DIRECTIVE");
        assert_eq!(err.line(), Some(1));

        assert!(guess_directives("guess 5 x").is_err());
    }

    #[test]
    fn test_identifier_starting_with_keyword_is_not_directive() {
        assert_eq!(directive_kind("guess_x = 2"), None);
        assert_eq!(directive_kind("keeper = 1"), None);
        assert_eq!(directive_kind("  Keep x on [0, 1]"), Some(DirectiveKind::Keep));
        assert!(guess_directives("guess_x = 2").unwrap().is_empty());
    }

    #[test]
    fn test_bound_directives() {
        let bounds = bound_directives("keep x on [-10, 10]\nkeep T_hot on [ 0.5 ,1e3 ]").unwrap();
        assert_eq!(bounds.len(), 2);
        assert_eq!(bounds[0], BoundDirective { line: 1, variable: "x".to_string(), low: -10.0, high: 10.0 });
        assert_eq!((bounds[1].low, bounds[1].high), (0.5, 1000.0));
    }

    #[test]
    fn test_malformed_bounds() {
        for text in ["keep x on [10]", "keep x on [1, 2", "keep x on 1, 2]", "keep x [1, 2]", "keep x on [1; 2]"] {
            let err = bound_directives(text).unwrap_err();
            assert_eq!(err.error_code(), "MALFORMED_DIRECTIVE", "{}", text);
        }
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let err = bound_directives("keep x on [10, -10]").unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_identifiers_skip_numbers_and_builtins() {
        let names = identifiers("x^2 + 1e5*y - sqrt(z) + 2.5E3 + pi*r_1");
        assert_eq!(names, vec!["x", "y", "z", "r_1"]);
    }

    #[test]
    fn test_identifier_glued_to_number_is_kept() {
        assert_eq!(identifiers("2x = 4*g"), vec!["x", "g"]);
        assert_eq!(identifiers("y = 3.28x + 1.5e-3 + 2E+4"), vec!["y", "x"]);
        assert_eq!(glued_identifier("2x = 4*g"), Some("x"));
        assert_eq!(glued_identifier("y =  * 3.280839895013123x"), Some("x"));
        assert_eq!(glued_identifier("2e = 1"), Some("e"));
        assert_eq!(glued_identifier("y = 1e5*x + 2.5E-3 + x2"), None);
    }

    #[test]
    fn test_euler_constant_is_not_a_variable() {
        assert_eq!(identifiers("y = e^x"), vec!["y", "x"]);
        assert!(is_reserved("e"));
    }

    #[test]
    fn test_directive_target() {
        assert_eq!(directive_target("guess 2 for g"), Some("g"));
        assert_eq!(directive_target("GUESS two FOR g"), Some("g"));
        assert_eq!(directive_target("keep x on [0, L]"), Some("x"));
        assert_eq!(directive_target("keep [0, 1]"), None);
        assert_eq!(directive_target("x = 2"), None);
    }

    #[test]
    fn test_builtin_name_without_call_is_a_variable() {
        assert_eq!(identifiers("min = 3 * max"), vec!["min", "max"]);
    }

    #[test]
    fn test_substitute_whole_tokens_only() {
        let out = substitute_identifiers("g*gx + g1 + 2e5 + g", |name| (name == "g").then(|| "(9.8)".to_string()));
        assert_eq!(out, "(9.8)*gx + g1 + 2e5 + (9.8)");
    }

    #[test]
    fn test_substitution_is_idempotent() {
        let subst = |name: &str| match name {
            "g" => Some("(9.8)".to_string()),
            "h" => Some("(19.6)".to_string()),
            _ => None,
        };
        let once = substitute_identifiers("m*h = F + g", subst);
        let twice = substitute_identifiers(&once, subst);
        assert_eq!(once, "m*(19.6) = F + (9.8)");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved("guess"));
        assert!(is_reserved("For"));
        assert!(is_reserved("sqrt"));
        assert!(is_reserved("pi"));
        assert!(!is_reserved("g"));
        assert!(is_identifier("m_dot2"));
        assert!(!is_identifier("2m"));
        assert!(!is_identifier("a b"));
    }
}
