use annotation_db::TaskAnnotations;
use chrono::DateTime;
use serde::Serialize;
use serde_json::Value;

use crate::types::{ReportError, Result};

pub const EXPORT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A task as written to an export file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportTask {
    pub completions: Vec<Value>,
    pub predictions: Vec<Value>,
    pub created_at: String,
    pub created_by: String,
    pub data: Value,
    pub id: i64,
}

pub fn export_tasks(tasks: &[TaskAnnotations], ground_truth_only: bool) -> Result<Vec<ExportTask>> {
    tasks
        .iter()
        .map(|task| export_task(task, ground_truth_only))
        .collect()
}

fn export_task(task: &TaskAnnotations, ground_truth_only: bool) -> Result<ExportTask> {
    let completions = task
        .completions
        .iter()
        .filter(|completion| !is_set(completion.get("deleted_at")))
        .filter(|completion| {
            !ground_truth_only || completion.get("honeypot").and_then(Value::as_bool) == Some(true)
        })
        .cloned()
        .collect();

    let mut data = task.data.clone();
    if let Some(fields) = data.as_object_mut() {
        fields.remove("pagination");
        if !task.title.is_empty() {
            fields.insert("title".to_string(), Value::String(task.title.clone()));
        }
    }

    let created_at = DateTime::parse_from_rfc3339(&task.created_at)
        .map_err(|source| ReportError::Timestamp {
            value: task.created_at.clone(),
            source,
        })?
        .format(EXPORT_TIME_FORMAT)
        .to_string();

    Ok(ExportTask {
        completions,
        predictions: task.predictions.clone(),
        created_at,
        created_by: task.created_by.clone(),
        data,
        id: task.task_id,
    })
}

fn is_set(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(text)) => !text.is_empty(),
        Some(_) => true,
    }
}
