use std::collections::HashSet;

use annotation_core::Shape;
use annotation_db::TaskAnnotations;

use crate::flatten::flatten_tasks;
use crate::types::{ChunkRow, FlatRow, ReportError, ReportFilter, Result, RowSource};

/// Submitted, live ground-truth rows of every annotator, de-duplicated and
/// ordered by label then task id.
pub fn annotator_rows(
    tasks: &[TaskAnnotations],
    shape: Shape,
    filter: &ReportFilter,
) -> Result<Vec<FlatRow>> {
    if shape == Shape::Region && filter.assertion_labels.is_some() {
        return Err(ReportError::AssertionOnRegion);
    }
    let rows = flatten_tasks(tasks, RowSource::Completions, shape)
        .into_iter()
        .filter(|row| row.is_reportable() && filter.matches(row));
    Ok(sorted(dedup(rows)))
}

/// Prediction rows. Predictions carry no lifecycle state, so nothing is
/// filtered out.
pub fn prediction_rows(tasks: &[TaskAnnotations], shape: Shape) -> Vec<FlatRow> {
    sorted(dedup(flatten_tasks(tasks, RowSource::Predictions, shape)))
}

/// Which annotator extracted which chunk under which label. Rows that only
/// differ by task collapse into one.
pub fn chunks_by_annotator(tasks: &[TaskAnnotations], shape: Shape) -> Vec<ChunkRow> {
    let mut seen = HashSet::new();
    let mut rows = flatten_tasks(tasks, RowSource::Completions, shape)
        .into_iter()
        .filter(FlatRow::is_reportable)
        .filter(|row| {
            seen.insert((
                row.label.clone(),
                row.username.clone(),
                row.chunk.clone(),
                row.honeypot,
                row.submitted_at.clone(),
                row.deleted_at.clone(),
                row.position,
            ))
        })
        .map(|row| ChunkRow {
            username: row.username,
            chunk: row.chunk,
            label: row.label,
        })
        .collect::<Vec<_>>();
    rows.sort_by(|left, right| left.label.cmp(&right.label));
    rows
}

fn dedup(rows: impl IntoIterator<Item = FlatRow>) -> Vec<FlatRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.clone()))
        .collect()
}

fn sorted(mut rows: Vec<FlatRow>) -> Vec<FlatRow> {
    rows.sort_by(|left, right| {
        left.label
            .cmp(&right.label)
            .then(left.task_id.cmp(&right.task_id))
    });
    rows
}
