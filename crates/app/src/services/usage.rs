use annotation_core::UsageCounters;
use annotation_db::{CompletionsMeta, Db, Project, UsageUpdate};

use crate::error::Result;
use crate::services::{SharedConfig, open_db, require_project};

#[derive(Clone)]
pub struct UsageService {
    config: SharedConfig,
}

impl UsageService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    /// Current label usage of a project. Empty when nothing was counted yet
    /// or the project predates usage tracking.
    pub fn labels_info(&self, project_name: &str) -> Result<UsageCounters> {
        let db = self.db()?;
        let project = require_project(&db, project_name)?;
        Ok(db
            .read_meta(project.id)?
            .and_then(|meta| meta.used_labels_info)
            .unwrap_or_default())
    }

    pub fn meta(&self, project_name: &str) -> Result<Option<CompletionsMeta>> {
        let db = self.db()?;
        let project = require_project(&db, project_name)?;
        Ok(db.read_meta(project.id)?)
    }
}

/// Logs the counters a lifecycle event left behind.
pub(super) fn log_usage(project: &Project, update: &UsageUpdate) {
    match update {
        UsageUpdate::Applied(counters) => {
            tracing::debug!(
                project = %project.name,
                fields = counters.iter().count(),
                "label usage applied"
            );
        }
        UsageUpdate::LegacySkipped => {
            tracing::debug!(project = %project.name, "legacy project, label usage not tracked");
        }
    }
}
