//! Speculative updaters for cached resources.
//!
//! Each function returns an updater for [`MutationExecutor`](crate::MutationExecutor).
//! Updaters understand the shapes the service answers with: a bare array of
//! records, a single record, and a paginated `{ "results": [...] }`
//! envelope. They return `None` when the cached value holds no matching
//! record, which leaves that entry untouched.

use serde_json::{Map, Value};

/// Updater that never changes anything (creates: the id is unknown).
pub fn none() -> impl Fn(&Value) -> Option<Value> + Send + Sync {
    |_: &Value| None
}

/// Set `field` to `value` on the record with `id`.
pub fn set_field(id: u64, field: impl Into<String>, value: Value) -> impl Fn(&Value) -> Option<Value> + Send + Sync {
    let field = field.into();
    move |data: &Value| {
        map_records(data, id, &|record: &Map<String, Value>| {
            let mut record = record.clone();
            record.insert(field.clone(), value.clone());
            Some(record)
        })
    }
}

/// Shallow-merge `patch` into the record with `id`.
pub fn merge_record(id: u64, patch: Value) -> impl Fn(&Value) -> Option<Value> + Send + Sync {
    move |data: &Value| {
        let Value::Object(patch) = &patch else {
            return None;
        };
        map_records(data, id, &|record: &Map<String, Value>| {
            let mut record = record.clone();
            for (k, v) in patch {
                record.insert(k.clone(), v.clone());
            }
            Some(record)
        })
    }
}

/// Drop the record with `id` from lists. A cached single record is left
/// in place; the detail key is invalidated once the server confirms.
pub fn remove_record(id: u64) -> impl Fn(&Value) -> Option<Value> + Send + Sync {
    move |data: &Value| match data {
        Value::Object(_) if is_record(data, id) => None,
        _ => map_records(data, id, &|_: &Map<String, Value>| None),
    }
}

/// Rewrite the records with `id` inside `data`.
///
/// `change` returns the replacement record, or `None` to remove it from a
/// list. Returns `None` when nothing matched.
fn map_records(data: &Value, id: u64, change: &dyn Fn(&Map<String, Value>) -> Option<Map<String, Value>>) -> Option<Value> {
    match data {
        Value::Array(items) => {
            let mut matched = false;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(record) if is_record(item, id) => {
                        matched = true;
                        if let Some(replacement) = change(record) {
                            out.push(Value::Object(replacement));
                        }
                    }
                    other => out.push(other.clone()),
                }
            }
            matched.then_some(Value::Array(out))
        }
        Value::Object(map) => {
            if is_record(data, id) {
                return change(map).map(Value::Object);
            }
            let results = map.get("results")?;
            let updated = map_records(results, id, change)?;
            let mut envelope = map.clone();
            envelope.insert("results".to_string(), updated);
            Some(Value::Object(envelope))
        }
        _ => None,
    }
}

fn is_record(value: &Value, id: u64) -> bool {
    value.get("id").and_then(Value::as_u64) == Some(id)
}
