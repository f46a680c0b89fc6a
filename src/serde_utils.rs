use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Reads an error `detail` field into one line of text.
///
/// Handlers put a plain string there, but request validation failures carry a
/// list of `{"loc": [...], "msg": "...", "type": "..."}` objects instead.
pub fn deserialize_detail<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(detail_text))
}

fn detail_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        Value::Array(items) => {
            let messages: Vec<String> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(mut fields) => fields.remove("msg").and_then(detail_text),
                    other => detail_text(other),
                })
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        other => Some(other.to_string()),
    }
}
