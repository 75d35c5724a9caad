//! Document mutation helpers shared by every store implementation.

use std::cmp::Ordering;

use domains::{DomainError, Result};
use serde_json::Value;

/// Array-union / array-remove on a top-level field, with Firestore semantics:
/// a missing field counts as an empty array.
pub(crate) fn apply_array_op(doc: &mut Value, field: &str, value: &Value, union: bool) -> Result<()> {
    let obj = doc
        .as_object_mut()
        .ok_or_else(|| DomainError::Storage("document is not an object".into()))?;

    let entry = obj
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    let items = entry.as_array_mut().ok_or_else(|| {
        DomainError::Storage(format!("field {field:?} is not an array"))
    })?;

    if union {
        if !items.contains(value) {
            items.push(value.clone());
        }
    } else {
        items.retain(|item| item != value);
    }
    Ok(())
}

/// Ordering used for `order_by`: numbers numerically, strings lexically,
/// everything else (including missing) sorts first.
pub(crate) fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Equality as used by query filters. Numbers compare by value so `1` and
/// `1.0` match.
pub(crate) fn field_matches(doc: &Value, field: &str, expected: &Value) -> bool {
    match (doc.get(field), expected) {
        (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Some(actual), expected) => actual == expected,
        (None, Value::Null) => true,
        (None, _) => false,
    }
}
