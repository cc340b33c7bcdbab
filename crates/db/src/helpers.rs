use annotation_core::CompletionRecord;
use chrono::{SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::{Project, Task};

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn json_column<T: DeserializeOwned>(
    row: &Row<'_>,
    index: usize,
) -> std::result::Result<T, rusqlite::Error> {
    let raw: String = row.get(index)?;
    serde_json::from_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)))
}

pub(crate) fn row_to_project(row: &Row<'_>) -> std::result::Result<Project, rusqlite::Error> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        label_config: row.get(2)?,
        created_version: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(crate) fn row_to_task(row: &Row<'_>) -> std::result::Result<Task, rusqlite::Error> {
    Ok(Task {
        pk: row.get(0)?,
        project_id: row.get(1)?,
        task_id: row.get(2)?,
        data: json_column(row, 3)?,
        title: row.get(4)?,
        predictions: json_column(row, 5)?,
        created_at: row.get(6)?,
        created_by: row.get(7)?,
    })
}

pub(crate) fn row_to_completion(
    row: &Row<'_>,
) -> std::result::Result<CompletionRecord, rusqlite::Error> {
    json_column(row, 0)
}

pub(crate) fn row_to_raw_completion(row: &Row<'_>) -> std::result::Result<Value, rusqlite::Error> {
    json_column(row, 0)
}

pub(crate) const TASK_COLUMNS: &str =
    "id, project_id, task_id, data, title, predictions, created_at, created_by";

pub(crate) const PROJECT_COLUMNS: &str = "id, name, label_config, created_version, created_at";

/// `?N, ?N+1, ...` for an `IN (...)` list starting after `offset` bound params.
pub(crate) fn placeholders(offset: usize, count: usize) -> String {
    (1..=count)
        .map(|index| format!("?{}", offset + index))
        .collect::<Vec<_>>()
        .join(", ")
}
