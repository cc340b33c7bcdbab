use rusqlite::{OptionalExtension, params};

use crate::Db;
use crate::error::{DbError, Result};
use crate::helpers::{PROJECT_COLUMNS, now_rfc3339, row_to_project};
use crate::types::Project;

impl Db {
    /// Creates a project. Passing no `created_version` makes it a legacy
    /// project whose label usage is never tracked.
    pub fn create_project(
        &self,
        name: &str,
        label_config: &str,
        created_version: Option<&str>,
    ) -> Result<Project> {
        self.conn.execute(
            r#"
            INSERT INTO project (name, label_config, created_version, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![name, label_config, created_version, now_rfc3339()],
        )?;
        let id = self.conn.last_insert_rowid();
        self.project(id)?.ok_or(DbError::ProjectNotFound(id))
    }

    pub fn project(&self, id: i64) -> Result<Option<Project>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM project WHERE id = ?1", PROJECT_COLUMNS),
                params![id],
                row_to_project,
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn project_by_name(&self, name: &str) -> Result<Option<Project>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM project WHERE name = ?1", PROJECT_COLUMNS),
                params![name],
                row_to_project,
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM project ORDER BY id ASC",
            PROJECT_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], row_to_project)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn set_label_config(&self, project_id: i64, label_config: &str) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE project SET label_config = ?1 WHERE id = ?2",
            params![label_config, project_id],
        )?;
        if updated == 0 {
            return Err(DbError::ProjectNotFound(project_id));
        }
        Ok(())
    }
}
