//! Dynamically-typed CSV cell value (§9 design note: the source coerces CSV
//! cells at runtime; the typed target models that as a tagged variant
//! instead of carrying the coercion logic at every call site).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
}

impl Cell {
    /// Coerce a raw CSV field into a `Cell` per the parser's field rules:
    /// empty string -> null, case-insensitive true/false -> bool, a finite
    /// number that wasn't quoted -> number, otherwise string.
    pub fn coerce(raw: &str, was_quoted: bool) -> Cell {
        if raw.is_empty() {
            return Cell::Null;
        }
        let lower = raw.to_ascii_lowercase();
        if lower == "true" {
            return Cell::Bool(true);
        }
        if lower == "false" {
            return Cell::Bool(false);
        }
        if !was_quoted {
            if let Ok(n) = raw.parse::<f64>() {
                if n.is_finite() {
                    return Cell::Num(n);
                }
            }
        }
        Cell::Str(raw.to_string())
    }

    /// Convenience accessor for JSON serialization of a row.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Null => serde_json::Value::Null,
            Cell::Bool(b) => serde_json::Value::Bool(*b),
            Cell::Num(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Cell::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}
