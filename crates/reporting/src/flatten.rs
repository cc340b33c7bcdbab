use annotation_core::{ResultKind, Shape, label_text};
use annotation_db::TaskAnnotations;
use rayon::prelude::*;
use serde_json::Value;

use crate::types::{FlatRow, Position, RowSource};

/// Expands the `result` arrays of completions (or predictions) belonging to
/// one task into one row per result entry.
pub fn flatten(records: &[Value], task_id: i64, shape: Shape) -> Vec<FlatRow> {
    let mut rows = Vec::new();
    for record in records {
        let username = text_field(record, "created_username");
        let honeypot = record
            .get("honeypot")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let submitted_at = text_field(record, "submitted_at");
        let deleted_at = text_field(record, "deleted_at");
        let Some(results) = record.get("result").and_then(Value::as_array) else {
            continue;
        };
        for result in results {
            let raw_type = result.get("type").and_then(Value::as_str).unwrap_or_default();
            let kind = ResultKind::parse(raw_type);
            let key = match &kind {
                ResultKind::Unknown(raw) => {
                    tracing::debug!(task_id, result_type = %raw, "skipping unsupported result");
                    continue;
                }
                ResultKind::Rating => continue,
                kind => match kind.label_key() {
                    Some(key) => key,
                    None => continue,
                },
            };
            let Some(value) = result.get("value") else {
                continue;
            };
            rows.push(FlatRow {
                username: username.clone(),
                label: label_values(value.get(key)),
                chunk: chunk_text(value),
                task_id,
                position: position(value, shape),
                honeypot,
                submitted_at: submitted_at.clone(),
                deleted_at: deleted_at.clone(),
            });
        }
    }
    rows
}

/// Flattens many tasks in parallel. Row order follows task order.
pub fn flatten_tasks(tasks: &[TaskAnnotations], source: RowSource, shape: Shape) -> Vec<FlatRow> {
    tasks
        .par_iter()
        .flat_map_iter(|task| {
            let records = match source {
                RowSource::Completions => &task.completions,
                RowSource::Predictions => &task.predictions,
            };
            flatten(records, task.task_id, shape)
        })
        .collect()
}

fn text_field(record: &Value, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn label_values(labels: Option<&Value>) -> Option<Vec<String>> {
    match labels? {
        Value::Null => None,
        Value::Array(items) => Some(items.iter().filter_map(label_text).collect()),
        other => Some(label_text(other).into_iter().collect()),
    }
}

fn chunk_text(value: &Value) -> Option<String> {
    match value.get("text")? {
        Value::Array(items) => items.first().and_then(label_text),
        other => label_text(other),
    }
}

fn number(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| value.get(*key).filter(|value| !value.is_null()))
        .and_then(|value| match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        })
}

fn position(value: &Value, shape: Shape) -> Position {
    match shape {
        Shape::Span => Position::Span {
            start: number(value, &["start"]),
            end: number(value, &["end"]),
        },
        Shape::Region => Position::Region {
            x: number(value, &["x_px", "x"]),
            y: number(value, &["y_px", "y"]),
            width: number(value, &["width_px", "width"]),
            height: number(value, &["height_px", "height"]),
        },
    }
}
