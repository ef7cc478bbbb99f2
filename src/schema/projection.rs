//! Field projection over decoded JSON records.
//!
//! A [`FieldPath`](super::FieldKey) is interpreted left to right against a
//! [`serde_json::Value`]. String keys only index objects and integer keys only
//! index arrays; any step that cannot be taken ends the walk with `None`.

use serde_json::Value;

use super::FieldKey;

/// Walk `path` through `record` and return the value it points at.
///
/// Returns `None` as soon as a key is missing, an index is out of range, or the
/// current value is not a container of the right kind. An empty path yields the
/// record itself.
pub fn project<'a>(record: &'a Value, path: &[FieldKey]) -> Option<&'a Value> {
    path.iter().try_fold(record, |current, key| match (key, current) {
        (FieldKey::Key(name), Value::Object(map)) => map.get(name),
        (FieldKey::Index(index), Value::Array(items)) => items.get(*index),
        _ => None,
    })
}

/// Whether a projected value should be rendered as an empty cell.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
