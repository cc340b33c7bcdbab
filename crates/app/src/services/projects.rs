use annotation_core::{LabelSchema, validate};
use annotation_db::{Db, MetaWrite, Project};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::services::{SharedConfig, open_db, project_schema, require_project};

#[derive(Clone)]
pub struct ProjectsService {
    config: SharedConfig,
}

impl ProjectsService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    /// Creates a project stamped with the running version. `legacy` leaves the
    /// version unset, as for projects that predate label usage tracking.
    pub fn create(&self, name: &str, label_config: &str, legacy: bool) -> Result<Project> {
        if name.trim().is_empty() {
            return Err(AppError::InvalidInput("project name is required".to_string()));
        }
        let mut db = self.db()?;
        if db.project_by_name(name)?.is_some() {
            return Err(AppError::InvalidInput(format!("project '{}' already exists", name)));
        }
        let schema = LabelSchema::parse(label_config)?;
        let version = (!legacy).then_some(self.config.app_version.as_str());
        let project = db.create_project(name, label_config, version)?;
        db.replace_schema_meta(project.id, &schema.schema_tuples())?;
        tracing::info!(project = %project.name, legacy, "project created");
        Ok(project)
    }

    pub fn get(&self, name: &str) -> Result<Project> {
        let db = self.db()?;
        require_project(&db, name)
    }

    pub fn list(&self) -> Result<Vec<Project>> {
        let db = self.db()?;
        Ok(db.list_projects()?)
    }

    pub fn schema(&self, name: &str) -> Result<LabelSchema> {
        let project = self.get(name)?;
        project_schema(&project)
    }

    /// Replaces the label configuration and the stored schema tuples. Label
    /// usage counts are left untouched.
    pub fn set_label_config(&self, name: &str, label_config: &str) -> Result<LabelSchema> {
        let schema = LabelSchema::parse(label_config)?;
        let mut db = self.db()?;
        let project = require_project(&db, name)?;
        db.set_label_config(project.id, label_config)?;
        match db.replace_schema_meta(project.id, &schema.schema_tuples())? {
            MetaWrite::Written => {
                tracing::info!(project = %project.name, fields = schema.fields().count(), "label config updated");
            }
            MetaWrite::LegacySkipped => {
                tracing::debug!(project = %project.name, "legacy project, schema meta not stored");
            }
        }
        Ok(schema)
    }

    /// Checks a completion body against the project's label configuration.
    pub fn validate(&self, name: &str, completion: &Value) -> Result<Option<String>> {
        let schema = self.schema(name)?;
        Ok(validate(completion, &schema))
    }
}
