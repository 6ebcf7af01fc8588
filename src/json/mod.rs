//! JSON handling for model output
//!
//! Models wrap their JSON in chatter, markdown fences and terminal escape
//! codes, and sometimes truncate it. This module locates and repairs that JSON,
//! reads fields by dotted path, normalizes values and diffs outputs from
//! different models.

mod clean;
mod diff;
mod normalize;
mod path;
mod repair;

pub use clean::{clean_and_parse_json, strip_ansi};
pub use diff::{diff, values_equal, Diff, DiffRow};
pub use normalize::{comparable_text, normalize_json_values, normalize_value};
pub use path::get_nested_value;
pub use repair::repair_json;

use serde_json::Value;

/// Whether a parsed model answer carries no data (`{}`, `[]` or `null`)
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Compact JSON for table cells, keeping non-ASCII text readable
pub fn to_compact_string(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

/// Plain text for table cells: strings without quotes, everything else as compact JSON
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => to_compact_string(other),
    }
}
