use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use annotation_core::LabelSchema;
use serde::Serialize;

/// Where the positional fields of a row came from.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
pub enum Position {
    Span {
        start: Option<f64>,
        end: Option<f64>,
    },
    Region {
        x: Option<f64>,
        y: Option<f64>,
        width: Option<f64>,
        height: Option<f64>,
    },
}

impl Position {
    fn bits(&self) -> [Option<u64>; 4] {
        let bits = |value: &Option<f64>| value.map(f64::to_bits);
        match self {
            Self::Span { start, end } => [bits(start), bits(end), None, None],
            Self::Region {
                x,
                y,
                width,
                height,
            } => [bits(x), bits(y), bits(width), bits(height)],
        }
    }
}

// Rows are grouped on exact coordinates, so equality is bitwise.
impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other) && self.bits() == other.bits()
    }
}

impl Eq for Position {}

impl Hash for Position {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        self.bits().hash(state);
    }
}

/// One result entry pulled out of a completion or prediction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FlatRow {
    pub username: Option<String>,
    /// The entry's `value[<label key>]` list; `None` when the key is absent.
    pub label: Option<Vec<String>>,
    pub chunk: Option<String>,
    #[serde(rename = "taskid")]
    pub task_id: i64,
    #[serde(flatten)]
    pub position: Position,
    pub honeypot: bool,
    pub submitted_at: Option<String>,
    pub deleted_at: Option<String>,
}

impl FlatRow {
    pub fn first_label(&self) -> Option<&str> {
        self.label.as_ref()?.first().map(String::as_str)
    }

    /// Live, submitted ground truth.
    pub fn is_reportable(&self) -> bool {
        self.deleted_at.is_none() && self.honeypot && self.submitted_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChunkRow {
    pub username: Option<String>,
    pub chunk: Option<String>,
    pub label: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSource {
    Completions,
    Predictions,
}

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub username: Option<String>,
    pub task_ids: Option<Vec<i64>>,
    pub assertion_labels: Option<BTreeSet<String>>,
}

impl ReportFilter {
    /// Restricts rows to labels marked (or not marked) as assertions in the
    /// project's label configuration. A row is judged by its first label.
    pub fn with_assertion(mut self, schema: &LabelSchema, is_assertion: bool) -> Self {
        self.assertion_labels = Some(schema.assertion_labels(is_assertion));
        self
    }

    pub(crate) fn matches(&self, row: &FlatRow) -> bool {
        if let Some(username) = &self.username
            && row.username.as_deref() != Some(username.as_str())
        {
            return false;
        }
        if let Some(task_ids) = &self.task_ids
            && !task_ids.contains(&row.task_id)
        {
            return false;
        }
        if let Some(labels) = &self.assertion_labels
            && !row.first_label().is_some_and(|label| labels.contains(label))
        {
            return false;
        }
        true
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("assertion filter applies to span projects only")]
    AssertionOnRegion,
    #[error("invalid task timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
}

pub type Result<T> = std::result::Result<T, ReportError>;
