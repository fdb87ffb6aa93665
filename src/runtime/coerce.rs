use crate::runtime::error::ErrorKind;
use crate::runtime::value::Value;

/// Truthiness: false only for boolean false, zero numbers, the empty
/// string, and nil.
pub fn to_bool(value: &Value) -> bool {
    match value {
        Value::Nil => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Str(s) => !s.is_empty(),
        _ => true,
    }
}

/// Strings parse as integer, then as float truncated toward zero;
/// kinds with no numeric reading coerce to 0.
pub fn to_int(value: &Value) -> i64 {
    match value {
        Value::Int(i) => *i,
        Value::Float(f) => *f as i64,
        Value::Str(s) => {
            if let Ok(i) = s.parse::<i64>() {
                i
            } else if let Ok(f) = s.parse::<f64>() {
                f as i64
            } else {
                0
            }
        }
        _ => 0,
    }
}

pub fn to_float(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Str(s) => s.parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

pub fn to_text(value: &Value) -> String {
    value.to_string()
}

pub fn try_index(value: &Value) -> Result<i64, ErrorKind> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Float(f) => Ok(*f as i64),
        _ => Err(ErrorKind::IndexNotNumber),
    }
}
