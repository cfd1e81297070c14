//! tally-expr
//!
//! Expression validator for counting submissions.
//!
//! - Text outside the fixed alphabet, or with no digit, is not a game move.
//! - Everything else is parsed as a small arithmetic grammar and evaluated.
//! - The result is rounded half-to-even to an `i64`.
//!
//! Pure: no IO, no time, no allocation beyond the token buffer and AST.

mod parser;

use std::fmt;

/// Every character a candidate submission may contain.
pub const ALPHABET: &str = "0123456789+-*/.() ";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Not a counting attempt at all (foreign characters, or no digit).
    NotANumberExpression,
    /// Malformed expression. `offset` is the byte offset where parsing failed.
    Syntax { offset: usize, reason: &'static str },
    /// Division (`/`, `//`) by zero, or zero raised to a negative power.
    DivisionByZero,
    /// The value is not finite or does not fit in an `i64`.
    OutOfRange,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotANumberExpression => write!(f, "not a number expression"),
            Self::Syntax { offset, reason } => {
                write!(f, "syntax error at offset {offset}: {reason}")
            }
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::OutOfRange => write!(f, "result out of range"),
        }
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Every character belongs to [`ALPHABET`]. Empty text passes.
pub fn is_in_alphabet(text: &str) -> bool {
    text.chars().all(|c| ALPHABET.contains(c))
}

/// Text that the game treats as a counting attempt.
pub fn is_candidate(text: &str) -> bool {
    is_in_alphabet(text) && text.chars().any(|c| c.is_ascii_digit())
}

/// Validate and evaluate a submission to an integer.
pub fn validate(text: &str) -> Result<i64, ValidationError> {
    if !is_candidate(text) {
        return Err(ValidationError::NotANumberExpression);
    }
    let value = parser::parse(text)?.eval()?;
    round_to_i64(value)
}

/// Half-to-even rounding into `i64`.
fn round_to_i64(value: f64) -> Result<i64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::OutOfRange);
    }
    let rounded = value.round_ties_even();
    // i64::MAX is not representable as f64; 2^63 is the first value past it.
    if rounded >= 9_223_372_036_854_775_808.0 || rounded < -9_223_372_036_854_775_808.0 {
        return Err(ValidationError::OutOfRange);
    }
    Ok(rounded as i64)
}
