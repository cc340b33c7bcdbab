use std::path::{Path, PathBuf};

use annotation_db::Db;

use crate::error::{AppError, Result};
use crate::services::AppServices;

/// Settings the annotation services run with.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub db_path: PathBuf,
    /// Annotators may soft-delete their own drafts only when this is set.
    pub allow_delete_completions: bool,
    /// Stamped as `created_version` on new projects.
    pub app_version: String,
}

/// Application state shared by frontends (CLI, tests).
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub services: AppServices,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let services = AppServices::new(&config);
        Self { config, services }
    }

    pub fn setup_db(&self) -> Result<()> {
        setup_db(&self.config.db_path)
    }

    pub fn initialize(&self) -> Result<()> {
        self.setup_db()
            .map_err(|err| AppError::Message(format!("initialize db: {}", err)))?;
        tracing::debug!(db_path = %self.config.db_path.display(), "database ready");
        Ok(())
    }
}

pub fn setup_db(path: &Path) -> Result<()> {
    let mut db = Db::open(path)?;
    db.migrate()?;
    Ok(())
}
