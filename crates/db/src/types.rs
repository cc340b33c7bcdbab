use annotation_core::{AggregationDelta, CompletionRecord, SchemaTuple, UsageCounters};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub label_config: String,
    /// Unset for projects created before label usage was tracked.
    pub created_version: Option<String>,
    pub created_at: String,
}

impl Project {
    pub fn tracks_usage(&self) -> bool {
        self.created_version
            .as_deref()
            .is_some_and(|version| !version.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub pk: i64,
    pub project_id: i64,
    pub task_id: i64,
    pub data: Value,
    pub title: String,
    pub predictions: Vec<Value>,
    pub created_at: String,
    pub created_by: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub task_id: i64,
    pub data: Value,
    pub title: String,
    pub predictions: Vec<Value>,
    pub created_by: String,
    pub tags: Vec<String>,
}

/// A task with its raw completion and prediction JSON, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskAnnotations {
    pub task_id: i64,
    pub title: String,
    pub data: Value,
    pub created_at: String,
    pub created_by: String,
    pub completions: Vec<Value>,
    pub predictions: Vec<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub task_ids: Option<Vec<i64>>,
    pub tags: Vec<String>,
    /// Skip tasks without any completion, deleted ones included.
    pub with_completions_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskCompletionSummary {
    pub task_id: i64,
    pub created_usernames: Vec<String>,
    pub updated_by: Vec<String>,
    pub created_ago: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundTruthBy {
    Submitted,
    Reviewed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultDetail {
    pub from_name: String,
    pub to_name: String,
    pub result_type: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionsMeta {
    pub project_id: i64,
    pub schema: Vec<SchemaTuple>,
    pub used_labels_info: Option<UsageCounters>,
}

/// Outcome of a counters read-modify-write.
#[derive(Debug, Clone, PartialEq)]
pub enum UsageUpdate {
    Applied(UsageCounters),
    LegacySkipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaWrite {
    Written,
    LegacySkipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionEventKind {
    Create,
    Update,
    Delete,
    Review,
}

impl CompletionEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Review => "review",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionEvent {
    pub completion_id: i64,
    pub kind: String,
    pub username: Option<String>,
    pub ts: String,
}

/// What a lifecycle edit turns a stored completion into, and the label usage
/// delta that goes with it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionChange {
    pub record: CompletionRecord,
    pub delta: Option<AggregationDelta>,
}
