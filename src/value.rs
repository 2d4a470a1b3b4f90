//! Runtime values shared by the interpreter, the pipe registry and the
//! serialized input state.
//!
//! Display, truthiness and number formatting follow the browser so that a
//! server render and the client runtime print the same text.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

/// Type tag used in type-check failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    /// Empty mapping, the default input state
    pub fn empty_object() -> Self {
        Value::Object(IndexMap::new())
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Property or index access. Missing keys read as `Null`.
    pub fn get(&self, key: &Value) -> Value {
        match (self, key) {
            (Value::Object(map), Value::String(k)) => map.get(k).cloned().unwrap_or(Value::Null),
            (Value::Object(map), Value::Number(n)) => {
                map.get(&format_number(*n)).cloned().unwrap_or(Value::Null)
            }
            (Value::Array(items), Value::Number(n)) => index_of(*n, items.len())
                .map(|i| items[i].clone())
                .unwrap_or(Value::Null),
            (Value::Array(items), Value::String(k)) if k == "length" => {
                Value::Number(items.len() as f64)
            }
            (Value::String(s), Value::Number(n)) => {
                let units: Vec<u16> = s.encode_utf16().collect();
                index_of(*n, units.len())
                    .map(|i| Value::String(String::from_utf16_lossy(&units[i..=i])))
                    .unwrap_or(Value::Null)
            }
            (Value::String(s), Value::String(k)) if k == "length" => {
                Value::Number(s.encode_utf16().count() as f64)
            }
            _ => Value::Null,
        }
    }

    /// JSON text, as `JSON.stringify` would produce it
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "null".to_string())
    }

    /// Text used when the value is an array element being joined
    fn element_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Join array elements the way `Array.prototype.join` does
    pub fn join(items: &[Value], separator: &str) -> String {
        items
            .iter()
            .map(Value::element_text)
            .collect::<Vec<_>>()
            .join(separator)
    }
}

fn index_of(n: f64, len: usize) -> Option<usize> {
    if n.fract() != 0.0 || n < 0.0 || n >= len as f64 {
        return None;
    }
    Some(n as usize)
}

/// Format a number the way a browser prints it.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        let sign = if n < 0.0 { "-" } else { "" };
        format!("{}{}", sign, format_positive(n.abs()))
    }
}

/// `Number.prototype.toString` for a finite positive number: fixed
/// notation for decimal exponents in `[-6, 21)`, exponential otherwise
fn format_positive(n: f64) -> String {
    // shortest round-trip digits, as `d.ddde<exp>`
    let sci = format!("{:e}", n);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let k = digits.len() as i32;
    let point = exp + 1;

    if k <= point && point <= 21 {
        format!("{}{}", digits, "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{}.{}", int, frac)
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let (first, rest) = digits.split_at(1);
        let sign = if exp < 0 { "-" } else { "+" };
        if rest.is_empty() {
            format!("{}e{}{}", first, sign, exp.abs())
        } else {
            format!("{}.{}e{}{}", first, rest, sign, exp.abs())
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => f.write_str(&Value::join(items, ",")),
            Value::Object(_) => f.write_str("[object Object]"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if !n.is_finite() => serializer.serialize_unit(),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => items.serialize(serializer),
            Value::Object(map) => map.serialize(serializer),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(1200.0), "1200");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(0.000001), "0.000001");
        assert_eq!(format_number(-2.5e-8), "-2.5e-8");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(123456789012345680000.0), "123456789012345680000");
    }

    #[test]
    fn test_string_access_counts_utf16_units() {
        let s = Value::from("😀a");
        assert_eq!(s.get(&Value::from("length")), Value::Number(3.0));
        assert_eq!(s.get(&Value::Number(2.0)), Value::from("a"));
    }

    #[test]
    fn test_display_matches_browser() {
        let v: Value = serde_json::from_str(r#"[1, "a", null, [2, 3]]"#).unwrap();
        assert_eq!(v.to_string(), "1,a,,2,3");
        assert_eq!(Value::empty_object().to_string(), "[object Object]");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
        assert!(Value::empty_object().is_truthy());
        assert!(!Value::Null.is_truthy());
    }

    #[test]
    fn test_json_keeps_insertion_order_and_integers() {
        let v: Value = serde_json::from_str(r#"{"b": 2, "a": 1.5, "c": [true]}"#).unwrap();
        assert_eq!(v.to_json(), r#"{"b":2,"a":1.5,"c":[true]}"#);
    }

    #[test]
    fn test_get() {
        let v: Value = serde_json::from_str(r#"{"items": ["x", "y"]}"#).unwrap();
        let items = v.get(&Value::from("items"));
        assert_eq!(items.get(&Value::Number(1.0)), Value::from("y"));
        assert_eq!(items.get(&Value::Number(5.0)), Value::Null);
        assert_eq!(items.get(&Value::from("length")), Value::Number(2.0));
        assert_eq!(v.get(&Value::from("missing")), Value::Null);
    }
}
