use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PatchParams {
    /// Page being edited in a multi-page document.
    #[serde(default = "first_page")]
    pub current_page: i64,
}

impl Default for PatchParams {
    fn default() -> Self {
        Self {
            current_page: first_page(),
        }
    }
}

fn first_page() -> i64 {
    1
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ReportParams {
    pub username: Option<String>,
    pub task_ids: Option<Vec<i64>>,
    /// `Some(true)` keeps assertion labels only, `Some(false)` drops them.
    pub assertion: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ExportParams {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ground_truth_only: bool,
    #[serde(default)]
    pub exclude_tasks_without_completions: bool,
}

/// One task as read from an import file.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TaskImport {
    pub id: i64,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub predictions: Vec<Value>,
    #[serde(default)]
    pub tags: Vec<String>,
}
