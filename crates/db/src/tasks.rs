use rusqlite::types::Value as SqlValue;
use rusqlite::{OptionalExtension, params, params_from_iter};

use crate::Db;
use crate::error::{DbError, Result};
use crate::helpers::{TASK_COLUMNS, now_rfc3339, placeholders, row_to_raw_completion, row_to_task};
use crate::types::{NewTask, Task, TaskAnnotations, TaskQuery};

impl Db {
    pub fn insert_task(&mut self, project_id: i64, task: &NewTask) -> Result<Task> {
        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO task (project_id, task_id, data, title, predictions, created_at, created_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                project_id,
                task.task_id,
                serde_json::to_string(&task.data)?,
                task.title,
                serde_json::to_string(&task.predictions)?,
                now_rfc3339(),
                task.created_by,
            ],
        )?;
        let pk = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare("INSERT OR IGNORE INTO task_tag (task_pk, tag) VALUES (?1, ?2)")?;
            for tag in &task.tags {
                stmt.execute(params![pk, tag])?;
            }
        }
        tx.commit()?;
        self.get_task(project_id, task.task_id)?
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn get_task(&self, project_id: i64, task_id: i64) -> Result<Option<Task>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM task WHERE project_id = ?1 AND task_id = ?2",
                    TASK_COLUMNS
                ),
                params![project_id, task_id],
                row_to_task,
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn tag_task(&self, task_pk: i64, tag: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO task_tag (task_pk, tag) VALUES (?1, ?2)",
            params![task_pk, tag],
        )?;
        Ok(())
    }

    pub fn task_tags(&self, task_pk: i64) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT tag FROM task_tag WHERE task_pk = ?1 ORDER BY tag ASC")?;
        let rows = stmt
            .query_map(params![task_pk], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(rows)
    }

    /// Tasks of a project with every stored completion (deleted ones
    /// included, filtering is left to reporting) and their predictions.
    pub fn task_annotations(
        &self,
        project_id: i64,
        query: &TaskQuery,
    ) -> Result<Vec<TaskAnnotations>> {
        let mut sql = format!("SELECT {} FROM task t WHERE t.project_id = ?1", prefixed_task_columns());
        let mut bound: Vec<SqlValue> = vec![SqlValue::Integer(project_id)];
        if let Some(task_ids) = &query.task_ids {
            if task_ids.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(&format!(
                " AND t.task_id IN ({})",
                placeholders(bound.len(), task_ids.len())
            ));
            bound.extend(task_ids.iter().map(|id| SqlValue::Integer(*id)));
        }
        if !query.tags.is_empty() {
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM task_tag tt WHERE tt.task_pk = t.id AND tt.tag IN ({}))",
                placeholders(bound.len(), query.tags.len())
            ));
            bound.extend(query.tags.iter().map(|tag| SqlValue::Text(tag.clone())));
        }
        if query.with_completions_only {
            sql.push_str(" AND EXISTS (SELECT 1 FROM completion c WHERE c.task_pk = t.id)");
        }
        sql.push_str(" ORDER BY t.task_id ASC");

        let tasks = {
            let mut stmt = self.conn.prepare(&sql)?;
            stmt.query_map(params_from_iter(bound), row_to_task)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };

        let mut stmt = self
            .conn
            .prepare("SELECT body FROM completion WHERE task_pk = ?1 ORDER BY position ASC")?;
        let mut annotations = Vec::with_capacity(tasks.len());
        for task in tasks {
            let completions = stmt
                .query_map(params![task.pk], row_to_raw_completion)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            annotations.push(TaskAnnotations {
                task_id: task.task_id,
                title: task.title,
                data: task.data,
                created_at: task.created_at,
                created_by: task.created_by,
                completions,
                predictions: task.predictions,
            });
        }
        Ok(annotations)
    }
}

fn prefixed_task_columns() -> String {
    TASK_COLUMNS
        .split(", ")
        .map(|column| format!("t.{}", column))
        .collect::<Vec<_>>()
        .join(", ")
}
