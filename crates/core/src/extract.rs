use serde_json::Value;

use crate::completion::{ResultEntry, ResultKind};

/// Textareas are counted by presence, never by content.
pub const TEXTAREA_LABEL: &str = "text";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedResultError {
    #[error("unsupported result type: {0}")]
    UnknownType(String),
    #[error("result for '{from_name}' has no value.{key}[0]")]
    MissingLabel { from_name: String, key: String },
}

/// Label value a result entry contributes to usage counters.
///
/// `Ok(None)` means the entry does not participate (relations, ratings,
/// pairwise comparisons). Errors are per entry; callers skip the entry and
/// keep going.
pub fn extract_label_value(entry: &ResultEntry) -> Result<Option<String>, MalformedResultError> {
    let kind = entry.kind();
    if !kind.counts_toward_usage() {
        return Ok(None);
    }
    match kind {
        ResultKind::TextArea => Ok(Some(TEXTAREA_LABEL.to_string())),
        ResultKind::Unknown(raw) => Err(MalformedResultError::UnknownType(raw)),
        kind => {
            let key = kind.label_key().unwrap_or_default();
            first_label(&entry.value, key)
                .map(Some)
                .ok_or_else(|| MalformedResultError::MissingLabel {
                    from_name: entry.from_name.clone(),
                    key: key.to_string(),
                })
        }
    }
}

pub(crate) fn first_label(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .and_then(|labels| labels.first())
        .and_then(label_text)
}

/// Text form of one label element. Taxonomy paths are joined with `/`.
pub fn label_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Array(parts) => {
            let parts = parts.iter().filter_map(label_text).collect::<Vec<_>>();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("/"))
            }
        }
        Value::Null | Value::Object(_) => None,
    }
}
