use annotation_db::{Db, GroundTruthBy, NewTask, Task, TaskCompletionSummary};

use crate::config::TaskImport;
use crate::error::{AppError, Result};
use crate::services::{SharedConfig, open_db, require_project, require_task};

#[derive(Clone)]
pub struct TasksService {
    config: SharedConfig,
}

impl TasksService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    pub fn import(&self, project_name: &str, tasks: Vec<TaskImport>, username: &str) -> Result<usize> {
        let mut db = self.db()?;
        let project = require_project(&db, project_name)?;
        let mut imported = 0usize;
        for task in tasks {
            if db.get_task(project.id, task.id)?.is_some() {
                return Err(AppError::InvalidInput(format!("task {} already exists", task.id)));
            }
            let new_task = NewTask {
                task_id: task.id,
                data: task.data,
                title: task.title,
                predictions: task.predictions,
                created_by: username.to_string(),
                tags: task.tags,
            };
            db.insert_task(project.id, &new_task)?;
            imported += 1;
        }
        tracing::info!(project = %project.name, imported, "tasks imported");
        Ok(imported)
    }

    pub fn get(&self, project_name: &str, task_id: i64) -> Result<Task> {
        let db = self.db()?;
        let project = require_project(&db, project_name)?;
        require_task(&db, &project, task_id)
    }

    /// Adds tags to a task; tags it already carries are kept once.
    pub fn tag(&self, project_name: &str, task_id: i64, tags: &[String]) -> Result<Vec<String>> {
        let db = self.db()?;
        let project = require_project(&db, project_name)?;
        let task = require_task(&db, &project, task_id)?;
        for tag in tags {
            db.tag_task(task.pk, tag)?;
        }
        Ok(db.task_tags(task.pk)?)
    }

    /// Ids of tasks holding at least one live completion.
    pub fn completion_ids(&self, project_name: &str) -> Result<Vec<i64>> {
        let db = self.db()?;
        let project = require_project(&db, project_name)?;
        Ok(db.completion_ids(project.id)?)
    }

    pub fn completion_summary(
        &self,
        project_name: &str,
        task_ids: &[i64],
    ) -> Result<Vec<TaskCompletionSummary>> {
        let db = self.db()?;
        let project = require_project(&db, project_name)?;
        Ok(db.task_completion_summary(project.id, task_ids)?)
    }

    pub fn ground_truth_count(
        &self,
        project_name: &str,
        tags: &[String],
        by: GroundTruthBy,
    ) -> Result<i64> {
        let db = self.db()?;
        let project = require_project(&db, project_name)?;
        Ok(db.ground_truth_count(project.id, tags, by)?)
    }
}
