//! Lenient scalar coercions over untrusted JSON.
//!
//! Each function takes `Option<&Value>` so it composes directly with
//! `Value::get`, where `None` stands for a missing key.

use serde_json::Value;

/// `""` for missing or null, otherwise the value's string form.
pub fn string_or_empty(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(v) => display(v),
    }
}

/// 0 for missing, null, blank or non-numeric input; otherwise the finite number.
pub fn number_or_zero(value: Option<&Value>) -> f64 {
    let n = match value {
        None | Some(Value::Null) => return 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => parse_number(s),
        Some(Value::Array(_)) | Some(Value::Object(_)) => return 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// The value itself only when it is a JSON boolean; anything else is `false`.
///
/// The strings `"true"` and `"1"` are deliberately not accepted.
pub fn boolean_or_false(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

/// Whether a value counts as present for list filtering.
///
/// Missing, null, `false`, zero and the empty string are falsy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// The list at `value`, or an empty slice when it is not a list.
pub fn list_or_empty(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }

    let radix = [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)]
        .into_iter()
        .find_map(|(prefix, radix)| s.strip_prefix(prefix).map(|digits| (digits, radix)));

    match radix {
        Some((digits, radix)) => u64::from_str_radix(digits, radix)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN),
        // Rust accepts "inf" and "nan", both rejected as non-finite by the caller.
        None => s.parse::<f64>().unwrap_or(f64::NAN),
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Array(items) => items.iter().map(display).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}
