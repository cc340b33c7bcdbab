use annotation_core::LabelSchema;
use annotation_db::{Db, TaskAnnotations, TaskQuery};
use reporting::{ChunkRow, ExportTask, FlatRow, ReportFilter};

use crate::config::{ExportParams, ReportParams};
use crate::error::Result;
use crate::services::{SharedConfig, open_db, project_schema, require_project};

#[derive(Clone)]
pub struct ReportsService {
    config: SharedConfig,
}

impl ReportsService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    fn load(&self, project_name: &str, query: &TaskQuery) -> Result<(LabelSchema, Vec<TaskAnnotations>)> {
        let db = self.db()?;
        let project = require_project(&db, project_name)?;
        let schema = project_schema(&project)?;
        let tasks = db.task_annotations(project.id, query)?;
        Ok((schema, tasks))
    }

    /// Ground-truth rows per annotator for the project's annotation shape.
    pub fn annotator_rows(&self, project_name: &str, params: &ReportParams) -> Result<Vec<FlatRow>> {
        let query = TaskQuery {
            task_ids: params.task_ids.clone(),
            ..TaskQuery::default()
        };
        let (schema, tasks) = self.load(project_name, &query)?;
        let mut filter = ReportFilter {
            username: params.username.clone(),
            task_ids: params.task_ids.clone(),
            assertion_labels: None,
        };
        if let Some(is_assertion) = params.assertion {
            filter = filter.with_assertion(&schema, is_assertion);
        }
        let rows = reporting::annotator_rows(&tasks, schema.shape(), &filter)?;
        tracing::debug!(project = project_name, rows = rows.len(), "annotator rows");
        Ok(rows)
    }

    pub fn prediction_rows(&self, project_name: &str) -> Result<Vec<FlatRow>> {
        let (schema, tasks) = self.load(project_name, &TaskQuery::default())?;
        Ok(reporting::prediction_rows(&tasks, schema.shape()))
    }

    pub fn chunks_by_annotator(&self, project_name: &str) -> Result<Vec<ChunkRow>> {
        let (schema, tasks) = self.load(project_name, &TaskQuery::default())?;
        Ok(reporting::chunks_by_annotator(&tasks, schema.shape()))
    }

    pub fn export(&self, project_name: &str, params: &ExportParams) -> Result<Vec<ExportTask>> {
        let query = TaskQuery {
            task_ids: None,
            tags: params.tags.clone(),
            with_completions_only: params.exclude_tasks_without_completions,
        };
        let (_, tasks) = self.load(project_name, &query)?;
        let exported = reporting::export_tasks(&tasks, params.ground_truth_only)?;
        tracing::info!(project = project_name, tasks = exported.len(), "tasks exported");
        Ok(exported)
    }
}
