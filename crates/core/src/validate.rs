use serde_json::{Map, Value};

use crate::completion::ResultKind;
use crate::extract::first_label;
use crate::schema::LabelSchema;

const REQUIRED_RESULT_KEYS: [&str; 4] = ["from_name", "to_name", "type", "value"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("lead_time should be integer")]
    LeadTime,
    #[error("Missing/invalid 'result' format")]
    InvalidResultFormat,
    #[error("Missing from_name|to_name|type|value")]
    MissingKeys,
    #[error("from_name|to_name|type should be according to the defined config")]
    ConfigMismatch,
    #[error("Missing start/end indexes")]
    MissingOffsets,
    #[error("start/end indexes should be integer")]
    NonIntegerOffsets,
    #[error("Unsupported result type: {0}")]
    UnsupportedType(String),
    #[error("Missing {0} in value")]
    MissingLabel(String),
    #[error("Invalid {result_type}: {label}")]
    InvalidLabel { result_type: String, label: String },
}

/// Checks a submitted completion body against the project's label schema.
/// The first failing check wins.
pub fn validate_completion(completion: &Value, schema: &LabelSchema) -> Result<(), ValidationError> {
    let Some(body) = completion.as_object() else {
        return Err(ValidationError::InvalidResultFormat);
    };
    // Toggling ground truth carries no annotation payload.
    if body.len() == 1 && body.contains_key("honeypot") {
        return Ok(());
    }
    if let Some(lead_time) = body.get("lead_time")
        && !lead_time.is_null()
        && !(lead_time.is_i64() || lead_time.is_u64())
    {
        return Err(ValidationError::LeadTime);
    }
    let Some(results) = body.get("result").and_then(Value::as_array) else {
        return Err(ValidationError::InvalidResultFormat);
    };

    let tuples = schema.tuple_set();
    for result in results {
        let Some(result) = result.as_object() else {
            return Err(ValidationError::MissingKeys);
        };
        let Some(raw_type) = result.get("type").and_then(Value::as_str) else {
            return Err(ValidationError::MissingKeys);
        };
        let kind = ResultKind::parse(raw_type);
        if kind.is_link() {
            continue;
        }
        if REQUIRED_RESULT_KEYS.iter().any(|key| !result.contains_key(*key)) {
            return Err(ValidationError::MissingKeys);
        }
        let from_name = result.get("from_name").and_then(Value::as_str);
        let to_name = result.get("to_name").and_then(Value::as_str);
        let (Some(from_name), Some(to_name)) = (from_name, to_name) else {
            return Err(ValidationError::ConfigMismatch);
        };
        let lowered = raw_type.to_lowercase();
        if !tuples.contains(&(from_name, to_name, lowered.as_str())) {
            return Err(ValidationError::ConfigMismatch);
        }
        match &kind {
            ResultKind::Rating | ResultKind::TextArea => continue,
            ResultKind::Unknown(raw) => return Err(ValidationError::UnsupportedType(raw.clone())),
            ResultKind::Labels => check_offsets(result)?,
            _ => {}
        }
        let key = kind.label_key().unwrap_or_default();
        let value = result.get("value").unwrap_or(&Value::Null);
        let Some(label) = first_label(value, key) else {
            return Err(ValidationError::MissingLabel(key.to_string()));
        };
        let label = label.trim();
        let allowed = schema
            .field(from_name)
            .is_some_and(|field| field.labels.contains(label));
        if !allowed {
            return Err(ValidationError::InvalidLabel {
                result_type: raw_type.to_string(),
                label: label.to_string(),
            });
        }
    }
    Ok(())
}

/// Message form used by callers that only surface text.
pub fn validate(completion: &Value, schema: &LabelSchema) -> Option<String> {
    validate_completion(completion, schema)
        .err()
        .map(|err| err.to_string())
}

fn check_offsets(result: &Map<String, Value>) -> Result<(), ValidationError> {
    let Some(value) = result.get("value").and_then(Value::as_object) else {
        return Err(ValidationError::MissingOffsets);
    };
    let (Some(start), Some(end)) = (value.get("start"), value.get("end")) else {
        return Err(ValidationError::MissingOffsets);
    };
    let has_original_length = result
        .get("original_length")
        .is_some_and(|value| !value.is_null());
    let is_integer = |value: &Value| value.is_i64() || value.is_u64();
    if !has_original_length && !(is_integer(start) && is_integer(end)) {
        return Err(ValidationError::NonIntegerOffsets);
    }
    Ok(())
}
