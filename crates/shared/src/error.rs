use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error document returned by the backend on a non-success status.
///
/// Either `{"detail": "..."}` or a mapping of field name to a list of
/// messages, e.g. `{"email": ["Enter a valid email address."]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorBody(pub Value);

impl ErrorBody {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok().map(Self)
    }

    pub fn detail(&self) -> Option<&str> {
        self.0
            .get("detail")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|detail| !detail.is_empty())
    }

    /// Collapses the body into a single user-facing message.
    ///
    /// `detail` wins when present. Otherwise every field's messages are
    /// collected in document order and joined with `", "`. Returns `None`
    /// when the body carries no usable text.
    pub fn flatten(&self) -> Option<String> {
        if let Some(detail) = self.detail() {
            return Some(detail.to_string());
        }

        let mut messages = Vec::new();
        collect_messages(&self.0, &mut messages);
        if messages.is_empty() {
            None
        } else {
            Some(messages.join(", "))
        }
    }
}

fn collect_messages(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if !text.is_empty() {
                out.push(text.to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_messages(item, out)),
        Value::Object(fields) => fields.values().for_each(|field| collect_messages(field, out)),
        Value::Number(_) | Value::Bool(_) | Value::Null => {}
    }
}
