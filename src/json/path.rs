use serde_json::Value;

/// Look up a dotted path such as `items.0.hs_code`.
///
/// Object segments are keys. Array segments must be all digits and in bounds.
pub fn get_nested_value<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            segment.parse::<usize>().ok().and_then(|i| items.get(i))
        }
        _ => None,
    })
}
