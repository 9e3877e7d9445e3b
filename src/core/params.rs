//! Purpose: Model the ordered positional parameter list bound into each statement.
//! Exports: `Param`, `ParamList`, `parse_integer`, `parse_real`.
//! Invariants: List order is command-line encounter order; the list never reorders.
//! Invariants: Numeric operands must be consumed whole or they are rejected.

use std::num::IntErrorKind;

use crate::core::error::{Error, ErrorKind};

/// One typed positional parameter, immutable once constructed.
#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Param {
    /// The command-line flag this parameter kind originates from.
    pub fn flag(&self) -> &'static str {
        match self {
            Param::Null => "-n",
            Param::Integer(_) => "-d",
            Param::Real(_) => "-f",
            Param::Text(_) => "-t",
        }
    }

    /// Payload rendering for diagnostics.
    pub fn render(&self) -> String {
        match self {
            Param::Null => "NULL".to_string(),
            Param::Integer(value) => value.to_string(),
            Param::Real(value) => format!("{value:.6}"),
            Param::Text(value) => value.clone(),
        }
    }
}

/// Append-only list of parameters, built once and reused across every target.
#[derive(Debug, Default)]
pub struct ParamList {
    params: Vec<Param>,
}

impl ParamList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, param: Param) {
        self.params.push(param);
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Param> {
        self.params.iter()
    }
}

/// Parse an integer operand with strtoll-style base detection.
///
/// Accepts optional leading whitespace and sign, then decimal digits, octal
/// with a `0` prefix, or hex with a `0x`/`0X` prefix. The whole operand must
/// be consumed. Valid syntax outside i64 is a `Range` error; anything else
/// malformed is `Parse`.
pub fn parse_integer(text: &str) -> Result<i64, Error> {
    let trimmed = text.trim_start();
    let (negative, body) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    if body.is_empty() {
        return Err(parse_error(text));
    }
    let (radix, digits) = if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        (16, hex)
    } else if body.len() > 1 && body.starts_with('0') {
        (8, body)
    } else {
        (10, body)
    };
    // from_str_radix accepts a sign of its own; one was already consumed above.
    if digits.is_empty() || digits.starts_with('+') || digits.starts_with('-') {
        return Err(parse_error(text));
    }
    let literal = if negative {
        format!("-{digits}")
    } else {
        digits.to_string()
    };
    i64::from_str_radix(&literal, radix).map_err(|err| match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => Error::new(ErrorKind::Range)
            .with_message("number does not fit in a 64-bit integer")
            .with_value(text),
        _ => parse_error(text),
    })
}

fn parse_error(text: &str) -> Error {
    Error::new(ErrorKind::Parse)
        .with_message("not a valid integer")
        .with_value(text)
}

/// Parse a real operand as a decimal or scientific f64, consumed whole.
pub fn parse_real(text: &str) -> Result<f64, Error> {
    text.trim_start().parse::<f64>().map_err(|_| {
        Error::new(ErrorKind::Parse)
            .with_message("not a valid floating point number")
            .with_value(text)
    })
}
