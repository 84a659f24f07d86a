//! # Parameter Expressions
//!
//! Hand-written lexer and recursive descent parser for the arithmetic allowed
//! on the right-hand side of a parameter line (`h: 2*g + 0.5`).
//!
//! Grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | primary
//! primary := number | identifier | '(' expr ')'
//! ```
//!
//! Identifiers are looked up in a caller-supplied scope at evaluation time;
//! nothing else (function calls, powers, assignments) is accepted.
//!
//! ## Example
//!
//! ```rust
//! use eqn_core::expr::evaluate;
//!
//! let value = evaluate("2 * (g + 0.2)", |name| (name == "g").then_some(9.8)).unwrap();
//! assert!((value - 20.0).abs() < 1e-12);
//! ```

use thiserror::Error;

/// Reasons an expression can fail to parse or evaluate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("unexpected character '{ch}' at column {column}")]
    UnexpectedChar { ch: char, column: usize },

    #[error("invalid number '{text}'")]
    InvalidNumber { text: String },

    #[error("unexpected '{found}' at column {column}")]
    UnexpectedToken { found: String, column: usize },

    #[error("expression ended unexpectedly")]
    UnexpectedEnd,

    #[error("empty expression")]
    Empty,

    #[error("unknown symbol '{name}'")]
    UnknownSymbol { name: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFinite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'input> {
    Num(f64),
    Ident(&'input str),
    Plus,
    Minus,
    Mul,
    Div,
    LParen,
    RParen,
}

impl Token<'_> {
    fn describe(&self) -> String {
        match self {
            Token::Num(n) => n.to_string(),
            Token::Ident(name) => (*name).to_string(),
            Token::Plus => "+".to_string(),
            Token::Minus => "-".to_string(),
            Token::Mul => "*".to_string(),
            Token::Div => "/".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
        }
    }
}

/// (column, token)
type Spanned<'input> = (usize, Token<'input>);

fn tokenize(text: &str) -> Result<Vec<Spanned<'_>>, EvalError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;
        match c {
            b' ' | b'\t' | b'\r' => {
                pos += 1;
                continue;
            }
            b'+' => tokens.push((start, Token::Plus)),
            b'-' => tokens.push((start, Token::Minus)),
            b'*' => tokens.push((start, Token::Mul)),
            b'/' => tokens.push((start, Token::Div)),
            b'(' => tokens.push((start, Token::LParen)),
            b')' => tokens.push((start, Token::RParen)),
            b'0'..=b'9' | b'.' => {
                pos = scan_number(bytes, pos);
                let literal = &text[start..pos];
                let value = literal.parse::<f64>().map_err(|_| EvalError::InvalidNumber {
                    text: literal.to_string(),
                })?;
                tokens.push((start, Token::Num(value)));
                continue;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                    pos += 1;
                }
                tokens.push((start, Token::Ident(&text[start..pos])));
                continue;
            }
            _ => {
                let ch = text[start..].chars().next().unwrap_or('?');
                return Err(EvalError::UnexpectedChar { ch, column: start + 1 });
            }
        }
        pos += 1;
    }

    Ok(tokens)
}

/// End offset of a numeric literal (`12`, `1.5`, `.5`, `2e-3`) starting at `pos`.
fn scan_number(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
        pos += 1;
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            while exp < bytes.len() && bytes[exp].is_ascii_digit() {
                exp += 1;
            }
            pos = exp;
        }
    }
    pos
}

/// Parsed parameter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parse an expression without evaluating it.
    pub fn parse(text: &str) -> Result<Expr, EvalError> {
        let tokens = tokenize(text)?;
        if tokens.is_empty() {
            return Err(EvalError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expr()?;
        if let Some((column, tok)) = parser.peek() {
            return Err(EvalError::UnexpectedToken {
                found: tok.describe(),
                column: column + 1,
            });
        }
        Ok(expr)
    }

    /// Evaluate against a scope. Every identifier must resolve.
    pub fn eval<F>(&self, scope: &F) -> Result<f64, EvalError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let value = match self {
            Expr::Num(n) => *n,
            Expr::Var(name) => scope(name).ok_or_else(|| EvalError::UnknownSymbol { name: name.clone() })?,
            Expr::Neg(inner) => -inner.eval(scope)?,
            Expr::Add(l, r) => l.eval(scope)? + r.eval(scope)?,
            Expr::Sub(l, r) => l.eval(scope)? - r.eval(scope)?,
            Expr::Mul(l, r) => l.eval(scope)? * r.eval(scope)?,
            Expr::Div(l, r) => {
                let numerator = l.eval(scope)?;
                let denominator = r.eval(scope)?;
                if denominator == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                numerator / denominator
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvalError::NonFinite)
        }
    }
}

/// Parse and evaluate `text` in one step.
pub fn evaluate<F>(text: &str, scope: F) -> Result<f64, EvalError>
where
    F: Fn(&str) -> Option<f64>,
{
    Expr::parse(text)?.eval(&scope)
}

/// Parser state holding tokenized input
struct Parser<'input> {
    tokens: Vec<Spanned<'input>>,
    pos: usize,
}

impl<'input> Parser<'input> {
    fn peek(&self) -> Option<Spanned<'input>> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Spanned<'input>> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expr(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.term()?;
        loop {
            match self.peek() {
                Some((_, Token::Plus)) => {
                    self.advance();
                    lhs = Expr::Add(Box::new(lhs), Box::new(self.term()?));
                }
                Some((_, Token::Minus)) => {
                    self.advance();
                    lhs = Expr::Sub(Box::new(lhs), Box::new(self.term()?));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn term(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some((_, Token::Mul)) => {
                    self.advance();
                    lhs = Expr::Mul(Box::new(lhs), Box::new(self.unary()?));
                }
                Some((_, Token::Div)) => {
                    self.advance();
                    lhs = Expr::Div(Box::new(lhs), Box::new(self.unary()?));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        match self.peek() {
            Some((_, Token::Minus)) => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            Some((_, Token::Plus)) => {
                self.advance();
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            Some((_, Token::Num(n))) => Ok(Expr::Num(n)),
            Some((_, Token::Ident(name))) => Ok(Expr::Var(name.to_string())),
            Some((_, Token::LParen)) => {
                let inner = self.expr()?;
                match self.advance() {
                    Some((_, Token::RParen)) => Ok(inner),
                    Some((column, tok)) => Err(EvalError::UnexpectedToken {
                        found: tok.describe(),
                        column: column + 1,
                    }),
                    None => Err(EvalError::UnexpectedEnd),
                }
            }
            Some((column, tok)) => Err(EvalError::UnexpectedToken {
                found: tok.describe(),
                column: column + 1,
            }),
            None => Err(EvalError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    fn no_scope(_: &str) -> Option<f64> {
        None
    }

    #[test]
    fn test_precedence() {
        assert_eq!(evaluate("1 + 2 * 3", no_scope).unwrap(), 7.0);
        assert_eq!(evaluate("(1 + 2) * 3", no_scope).unwrap(), 9.0);
        assert_eq!(evaluate("8 / 4 / 2", no_scope).unwrap(), 1.0);
        assert_eq!(evaluate("10 - 4 - 3", no_scope).unwrap(), 3.0);
    }

    #[test]
    fn test_unary_signs() {
        assert_eq!(evaluate("-3", no_scope).unwrap(), -3.0);
        assert_eq!(evaluate("-(2 + 3) * -2", no_scope).unwrap(), 10.0);
        assert_eq!(evaluate("+4 - -1", no_scope).unwrap(), 5.0);
    }

    #[test]
    fn test_number_forms() {
        assert_eq!(evaluate(".5", no_scope).unwrap(), 0.5);
        assert_eq!(evaluate("2.5e3", no_scope).unwrap(), 2500.0);
        assert_relative_eq!(evaluate("6.674E-11", no_scope).unwrap(), 6.674e-11);
        assert!(matches!(evaluate("1.2.3", no_scope), Err(EvalError::InvalidNumber { .. })));
    }

    #[test]
    fn test_scope_lookup() {
        let scope: HashMap<&str, f64> = HashMap::from([("g", 9.8), ("m_1", 2.0)]);
        let value = evaluate("m_1 * g", |name| scope.get(name).copied()).unwrap();
        assert_relative_eq!(value, 19.6);
    }

    #[test]
    fn test_unknown_symbol() {
        let err = evaluate("2 * later", no_scope).unwrap_err();
        assert_eq!(err, EvalError::UnknownSymbol { name: "later".to_string() });
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(evaluate("1 / (2 - 2)", no_scope).unwrap_err(), EvalError::DivisionByZero);
    }

    #[test]
    fn test_overflow_is_rejected() {
        assert_eq!(evaluate("1e308 * 10", no_scope).unwrap_err(), EvalError::NonFinite);
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(evaluate("", no_scope).unwrap_err(), EvalError::Empty);
        assert_eq!(evaluate("2 *", no_scope).unwrap_err(), EvalError::UnexpectedEnd);
        assert_eq!(evaluate("(1 + 2", no_scope).unwrap_err(), EvalError::UnexpectedEnd);
        assert!(matches!(evaluate("1 + 2)", no_scope), Err(EvalError::UnexpectedToken { .. })));
        assert!(matches!(evaluate("2 3", no_scope), Err(EvalError::UnexpectedToken { .. })));
    }

    #[test]
    fn test_rejects_code_and_powers() {
        assert!(matches!(
            evaluate("__import__('os')", no_scope),
            Err(EvalError::UnexpectedChar { ch: '\'', .. }) | Err(EvalError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            evaluate("2 ^ 3", no_scope),
            Err(EvalError::UnexpectedChar { ch: '^', column: 3 })
        ));
        assert!(evaluate("2 ** 3", no_scope).is_err());
    }
}
