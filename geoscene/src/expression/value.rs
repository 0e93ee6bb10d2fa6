//! See [`Value`].

use crate::Color;
use std::fmt::{Display, Formatter};

/// Result of evaluating an expression.
///
/// Follows the value model of the expression language: `Undefined` is distinct from `Null`,
/// numbers are always `f64` and may be `NaN` or infinite.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value. Appearance properties resolving to it are omitted.
    #[default]
    Undefined,
    /// `null`
    Null,
    /// Boolean.
    Bool(bool),
    /// Number.
    Number(f64),
    /// String.
    String(String),
    /// Color produced by a color function.
    Color(Color),
    /// Array or object taken from feature properties.
    Json(serde_json::Value),
}

impl Value {
    /// Converts a JSON value. Arrays and objects are kept as [`Value::Json`].
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(v) => Value::Bool(*v),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            other => Value::Json(other.clone()),
        }
    }

    /// Converts the value into JSON. Colors become `#RRGGBB` strings, numbers that JSON cannot
    /// hold become `null`. Returns `None` for `Undefined`.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        Some(match self {
            Value::Undefined => return None,
            Value::Null => serde_json::Value::Null,
            Value::Bool(v) => serde_json::Value::Bool(*v),
            Value::Number(n) => json_number(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Color(c) => serde_json::Value::String(c.to_hex()),
            Value::Json(v) => v.clone(),
        })
    }

    /// Returns true for `Undefined`.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Truthiness: `undefined`, `null`, `false`, `0`, `NaN` and `""` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(v) => *v,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Color(_) | Value::Json(_) => true,
        }
    }

    /// Numeric conversion, as done by arithmetic operators.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(v) => f64::from(u8::from(*v)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Color(_) => f64::NAN,
            Value::Json(serde_json::Value::Array(items)) => match items.as_slice() {
                [] => 0.0,
                [single] => Value::from_json(single).to_number(),
                _ => f64::NAN,
            },
            Value::Json(_) => f64::NAN,
        }
    }

    /// Text used when the value is spliced into an expression outside of a string literal.
    ///
    /// Strings are quoted, colors become `color("#RRGGBB")` calls, so the spliced text evaluates
    /// back to an equal value.
    pub fn to_literal(&self) -> String {
        match self {
            Value::String(s) => quote(s),
            Value::Color(c) => format!("color(\"{}\")", c.to_hex()),
            Value::Json(v) => v.to_string(),
            other => other.to_string(),
        }
    }

    /// Whether the value takes part in arithmetic as a string.
    pub(crate) fn is_string_like(&self) -> bool {
        matches!(self, Value::String(_) | Value::Color(_) | Value::Json(_))
    }

    /// `===`: no type coercion. Colors compare equal to their hex string.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(_) | Value::Color(_), Value::String(_) | Value::Color(_)) => {
                self.to_string() == other.to_string()
            }
            (Value::Json(a), Value::Json(b)) => a == b,
            _ => false,
        }
    }

    /// `==`: `null` equals `undefined`, mixed primitives are compared as numbers.
    pub fn loose_equals(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Undefined | Null, Undefined | Null) => true,
            (Undefined | Null, _) | (_, Undefined | Null) => false,
            (Json(_), Json(_)) => self.strict_equals(other),
            (Json(_), _) | (_, Json(_)) => self.to_string() == other.to_string(),
            (String(_) | Color(_), String(_) | Color(_)) => self.strict_equals(other),
            _ => self.to_number() == other.to_number(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Color(c) => f.write_str(&c.to_hex()),
            Value::Json(serde_json::Value::Array(items)) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|item| match item {
                        serde_json::Value::Null => String::new(),
                        other => Value::from_json(other).to_string(),
                    })
                    .collect();
                f.write_str(&parts.join(","))
            }
            Value::Json(_) => f.write_str("[object Object]"),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Color> for Value {
    fn from(value: Color) -> Self {
        Value::Color(value)
    }
}

/// Formats a number the way the expression language prints it: integers without a fraction,
/// `NaN`, `Infinity` and `-Infinity` by name, negative zero as `0`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

fn json_number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Whole-string numeric conversion: surrounding whitespace is ignored, an empty string is 0 and
/// anything else that is not a number is `NaN`.
fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }

    let looks_numeric = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !looks_numeric {
        return f64::NAN;
    }

    trimmed.parse().unwrap_or(f64::NAN)
}
