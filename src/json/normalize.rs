use serde_json::{Map, Number, Value};

/// Normalize one scalar for comparison.
///
/// Strings lose all whitespace and become numbers when what is left parses as
/// a finite float, so `" 9.0 "` and `9` compare equal. Other values pass through.
pub fn normalize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => {
            let stripped: String = s.chars().filter(|c| !c.is_whitespace()).collect();
            stripped
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::String(stripped))
        }
        other => other.clone(),
    }
}

/// [`normalize_value`] applied to every leaf
pub fn normalize_json_values(data: &Value) -> Value {
    match data {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalize_json_values(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(normalize_json_values).collect()),
        other => normalize_value(other),
    }
}

/// Text form used to decide whether two models disagree on a field.
///
/// Absent and `null` are both empty. Numbers and numeric strings compare by
/// value, everything else case-insensitively with whitespace removed.
pub fn comparable_text(value: Option<&Value>) -> String {
    match value.map(normalize_value) {
        None | Some(Value::Null) => String::new(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) => f.to_string(),
            None => n.to_string(),
        },
        Some(Value::String(s)) => s.to_lowercase(),
        Some(other) => other.to_string().to_lowercase(),
    }
}
