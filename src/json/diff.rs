//! Symmetric structural diff between two JSON documents

use serde_json::{json, Map, Value};

/// Difference between an old and a new value
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Scalar change or type mismatch
    Replaced { old: Value, new: Value },
    /// Per-key changes of two objects
    Object {
        changed: Vec<(String, Diff)>,
        inserted: Vec<(String, Value)>,
        deleted: Vec<(String, Value)>,
    },
    /// Positional changes of two arrays. Extra trailing elements are inserts or deletes.
    Array {
        changed: Vec<(usize, Diff)>,
        inserted: Vec<(usize, Value)>,
        deleted: Vec<(usize, Value)>,
    },
}

/// One flattened difference: dotted field, old side, new side
#[derive(Debug, Clone, PartialEq)]
pub struct DiffRow {
    pub field: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// Deep equality where numbers compare by value (`9 == 9.0`) and key order is ignored
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(fx), Some(fy)) if x.is_f64() || y.is_f64() => fx == fy,
            _ => x == y,
        },
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| values_equal(v, other)))
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        _ => a == b,
    }
}

/// Compute the difference from `old` to `new`. `None` when they are equal.
pub fn diff(old: &Value, new: &Value) -> Option<Diff> {
    if values_equal(old, new) {
        return None;
    }

    match (old, new) {
        (Value::Object(a), Value::Object(b)) => Some(diff_objects(a, b)),
        (Value::Array(a), Value::Array(b)) => Some(diff_arrays(a, b)),
        _ => Some(Diff::Replaced {
            old: old.clone(),
            new: new.clone(),
        }),
    }
}

fn diff_objects(old: &Map<String, Value>, new: &Map<String, Value>) -> Diff {
    let mut changed = Vec::new();
    let mut deleted = Vec::new();

    for (key, old_value) in old {
        match new.get(key) {
            Some(new_value) => {
                if let Some(d) = diff(old_value, new_value) {
                    changed.push((key.clone(), d));
                }
            }
            None => deleted.push((key.clone(), old_value.clone())),
        }
    }

    let inserted = new
        .iter()
        .filter(|(key, _)| !old.contains_key(*key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Diff::Object {
        changed,
        inserted,
        deleted,
    }
}

fn diff_arrays(old: &[Value], new: &[Value]) -> Diff {
    let changed = old
        .iter()
        .zip(new)
        .enumerate()
        .filter_map(|(i, (a, b))| diff(a, b).map(|d| (i, d)))
        .collect();

    let shared = old.len().min(new.len());
    let inserted = new[shared..]
        .iter()
        .enumerate()
        .map(|(i, v)| (shared + i, v.clone()))
        .collect();
    let deleted = old[shared..]
        .iter()
        .enumerate()
        .map(|(i, v)| (shared + i, v.clone()))
        .collect();

    Diff::Array {
        changed,
        inserted,
        deleted,
    }
}

impl Diff {
    /// Serializable symmetric form.
    ///
    /// Changes are `[old, new]` pairs. Objects carry `$insert`/`$delete` maps,
    /// arrays carry `$insert`/`$delete` lists of `[index, value]` pairs and
    /// changed indices as string keys.
    pub fn to_json(&self) -> Value {
        match self {
            Diff::Replaced { old, new } => json!([old, new]),
            Diff::Object {
                changed,
                inserted,
                deleted,
            } => {
                let mut out = Map::new();
                for (key, d) in changed {
                    out.insert(key.clone(), d.to_json());
                }
                if !inserted.is_empty() {
                    let map: Map<String, Value> = inserted.iter().cloned().collect();
                    out.insert("$insert".to_string(), Value::Object(map));
                }
                if !deleted.is_empty() {
                    let map: Map<String, Value> = deleted.iter().cloned().collect();
                    out.insert("$delete".to_string(), Value::Object(map));
                }
                Value::Object(out)
            }
            Diff::Array {
                changed,
                inserted,
                deleted,
            } => {
                let mut out = Map::new();
                for (index, d) in changed {
                    out.insert(index.to_string(), d.to_json());
                }
                if !inserted.is_empty() {
                    out.insert("$insert".to_string(), indexed_pairs(inserted));
                }
                if !deleted.is_empty() {
                    out.insert("$delete".to_string(), indexed_pairs(deleted));
                }
                Value::Object(out)
            }
        }
    }

    /// Leaf-level differences as `(dotted field, old, new)` rows
    pub fn flatten(&self) -> Vec<DiffRow> {
        let mut rows = Vec::new();
        self.flatten_into("", &mut rows);
        rows
    }

    fn flatten_into(&self, prefix: &str, rows: &mut Vec<DiffRow>) {
        let join = |segment: &str| {
            if prefix.is_empty() {
                segment.to_string()
            } else {
                format!("{prefix}.{segment}")
            }
        };

        match self {
            Diff::Replaced { old, new } => rows.push(DiffRow {
                field: if prefix.is_empty() {
                    "(root)".to_string()
                } else {
                    prefix.to_string()
                },
                old: Some(old.clone()),
                new: Some(new.clone()),
            }),
            Diff::Object {
                changed,
                inserted,
                deleted,
            } => {
                for (key, d) in changed {
                    d.flatten_into(&join(key), rows);
                }
                push_sides(rows, deleted.iter().map(|(k, v)| (join(k), v)), true);
                push_sides(rows, inserted.iter().map(|(k, v)| (join(k), v)), false);
            }
            Diff::Array {
                changed,
                inserted,
                deleted,
            } => {
                for (index, d) in changed {
                    d.flatten_into(&join(&index.to_string()), rows);
                }
                push_sides(
                    rows,
                    deleted.iter().map(|(i, v)| (join(&i.to_string()), v)),
                    true,
                );
                push_sides(
                    rows,
                    inserted.iter().map(|(i, v)| (join(&i.to_string()), v)),
                    false,
                );
            }
        }
    }
}

fn push_sides<'a>(
    rows: &mut Vec<DiffRow>,
    entries: impl Iterator<Item = (String, &'a Value)>,
    is_old: bool,
) {
    for (field, value) in entries {
        let (old, new) = if is_old {
            (Some(value.clone()), None)
        } else {
            (None, Some(value.clone()))
        };
        rows.push(DiffRow { field, old, new });
    }
}

fn indexed_pairs(entries: &[(usize, Value)]) -> Value {
    Value::Array(entries.iter().map(|(i, v)| json!([i, v])).collect())
}
