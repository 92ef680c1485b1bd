//! Stored Values
//!
//! Everything kept in the value store is a [`Value`]. Field inputs usually
//! arrive as text (whatever the user typed), calculation outputs are always
//! numbers, and a missing or undefined result is [`Value::Empty`].
//!
//! # Numeric Coercion
//!
//! Calculation results are coerced to a number before they are stored.
//! Coercion follows the usual form-input rules:
//!
//! - numbers pass through unless they are NaN
//! - text is trimmed and parsed as a decimal literal (`"12"`, `"-0.5"`,
//!   `".5"`, `"1e3"`), a `0x`/`0o`/`0b` integer literal, or `Infinity`
//! - blank text and [`Value::Empty`] are not numbers
//!
//! A value that does not coerce stops the cascade branch that produced it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A value held in the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A numeric value.
    Number(f64),
    /// Raw or formatted text.
    Text(String),
    /// No value (an undefined result or a field without content).
    #[default]
    Empty,
}

impl Value {
    /// Coerce this value to a number.
    ///
    /// Returns `None` when the value is not a number.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_nan() => None,
            Value::Number(n) => Some(*n),
            Value::Text(text) => parse_number(text),
            Value::Empty => None,
        }
    }

    /// Coerce this value to a number, mapping failures to NaN.
    pub fn as_f64(&self) -> f64 {
        self.to_number().unwrap_or(f64::NAN)
    }

    /// Check if this value is [`Value::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Empty)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(text) => f.write_str(text),
            Value::Empty => Ok(()),
        }
    }
}

/// Render a number the way it is shown in a form field.
///
/// Integral values have no fractional part, fractions use the shortest
/// representation that reads back to the same number.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if n == 0.0 {
        // Covers -0.0 as well.
        "0".to_string()
    } else {
        n.to_string()
    }
}

/// Parse form text into a number.
fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (sign, unsigned) = match trimmed.as_bytes()[0] {
        b'-' => (-1.0, &trimmed[1..]),
        b'+' => (1.0, &trimmed[1..]),
        _ => (1.0, trimmed),
    };

    if unsigned == "Infinity" {
        return Some(sign * f64::INFINITY);
    }

    // Radix literals are only valid without a sign.
    if sign > 0.0 && !trimmed.starts_with('+') {
        for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
            let rest = unsigned
                .strip_prefix(prefix)
                .or_else(|| unsigned.strip_prefix(prefix.to_uppercase().as_str()));
            if let Some(digits) = rest {
                return u64::from_str_radix(digits, radix).ok().map(|n| n as f64);
            }
        }
    }

    // `f64::from_str` also accepts "inf" and "nan", which are not numbers here.
    let is_decimal = unsigned
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !is_decimal || !unsigned.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }

    // A sign inside the literal is only valid as the exponent sign.
    let bytes = unsigned.as_bytes();
    let misplaced_sign = bytes.iter().enumerate().any(|(i, &b)| {
        matches!(b, b'+' | b'-') && (i == 0 || !matches!(bytes[i - 1], b'e' | b'E'))
    });
    if misplaced_sign {
        return None;
    }

    unsigned
        .parse::<f64>()
        .ok()
        .filter(|n| !n.is_nan())
        .map(|n| sign * n)
}
