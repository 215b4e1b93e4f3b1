//! Type inference for bare `key=value` items sent as JSON

use serde_json::{Number, Value};

/// Convert a token into the most specific JSON value it spells: integer,
/// boolean, float, a bracketed list, and finally the string itself.
pub fn coerce(raw: &str) -> Value {
    if let Some(value) = scalar(raw) {
        return value;
    }
    if let Some(inner) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        if inner.trim().is_empty() {
            return Value::Array(Vec::new());
        }
        return Value::Array(inner.split(',').map(element).collect());
    }
    Value::String(raw.to_string())
}

fn scalar(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    match s {
        "t" | "T" | "true" | "True" | "TRUE" => return Some(Value::Bool(true)),
        "f" | "F" | "false" | "False" | "FALSE" => return Some(Value::Bool(false)),
        _ => {}
    }
    // Non-finite floats have no JSON form
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn element(s: &str) -> Value {
    match coerce(s.trim()) {
        Value::String(text) => {
            Value::String(text.trim_matches(|c| c == '"' || c == '\'' || c == ' ').to_string())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer() {
        assert_eq!(coerce("42"), json!(42));
        assert_eq!(coerce("-7"), json!(-7));
    }

    #[test]
    fn test_boolean() {
        assert_eq!(coerce("true"), json!(true));
        assert_eq!(coerce("False"), json!(false));
        assert_eq!(coerce("T"), json!(true));
        assert_eq!(coerce("f"), json!(false));
        assert_eq!(coerce("tRuE"), json!("tRuE"));
    }

    #[test]
    fn test_float() {
        assert_eq!(coerce("3.14"), json!(3.14));
    }

    #[test]
    fn test_list_elements_are_coerced() {
        assert_eq!(coerce(r#"[1,true,"x"]"#), json!([1, true, "x"]));
        assert_eq!(coerce("[ 1, 'two' , 3.5 ]"), json!([1, "two", 3.5]));
        assert_eq!(coerce("[]"), json!([]));
    }

    #[test]
    fn test_falls_back_to_string() {
        assert_eq!(coerce("hello"), json!("hello"));
        assert_eq!(coerce("NaN"), json!("NaN"));
        assert_eq!(coerce("[unclosed"), json!("[unclosed"));
        assert_eq!(coerce(""), json!(""));
    }
}
