use serde_json::Value;

/// Removes null-valued keys from a JSON object body, or null items from an array body.
///
/// Only the top level is touched; nested nulls are part of the caller's data.
pub fn strip_nulls(body: &Value) -> Value {
    match body {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().filter(|item| !item.is_null()).cloned().collect())
        }
        other => other.clone(),
    }
}
