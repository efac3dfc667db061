//! Row ordering shared by the adapters that sort in process.

use std::cmp::Ordering;

use domains::{FetchOptions, Row};
use serde_json::Value;

fn rank(v: Option<&Value>) -> u8 {
    match v {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Total order over JSON column values. Missing and null sort first, then
/// booleans, numbers, strings; values of different types order by type.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Stable sort by `options.order_by` (ties keep their incoming order),
/// then truncation to `options.limit`.
pub fn apply(rows: &mut Vec<Row>, options: &FetchOptions) {
    if let Some(order) = &options.order_by {
        let column = order.column.as_str();
        if order.is_ascending() {
            rows.sort_by(|a, b| compare_values(a.get(column), b.get(column)));
        } else {
            rows.sort_by(|a, b| compare_values(b.get(column), a.get(column)));
        }
    }
    if let Some(limit) = options.limit {
        rows.truncate(limit);
    }
}

/// A column value as the text used for key comparisons.
pub fn key_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::OrderBy;
    use serde_json::json;

    fn rows(values: &[Value]) -> Vec<Row> {
        values.iter().map(|v| v.as_object().cloned().unwrap_or_default()).collect()
    }

    #[test]
    fn descending_keeps_ties_in_insertion_order() {
        let mut data = rows(&[
            json!({ "id": "a", "order": 1 }),
            json!({ "id": "b", "order": 2 }),
            json!({ "id": "c", "order": 1 }),
            json!({ "id": "d" }),
        ]);

        apply(&mut data, &FetchOptions::ordered(OrderBy::desc("order")));

        let ids: Vec<_> = data.iter().map(|r| r["id"].as_str().unwrap_or("")).collect();
        assert_eq!(ids, ["b", "a", "c", "d"]);
    }

    #[test]
    fn timestamps_sort_as_text() {
        let mut data = rows(&[
            json!({ "timestamp": "2024-05-01T00:00:00.000Z" }),
            json!({ "timestamp": "2023-12-31T23:59:59.000Z" }),
        ]);

        apply(&mut data, &FetchOptions::ordered(OrderBy::asc("timestamp")).with_limit(1));

        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["timestamp"], "2023-12-31T23:59:59.000Z");
    }

    #[test]
    fn numeric_keys_compare_as_text() {
        assert_eq!(key_text(&json!(7)).as_deref(), Some("7"));
        assert_eq!(key_text(&json!("about")).as_deref(), Some("about"));
        assert_eq!(key_text(&json!(null)), None);
    }
}
