mod completions;
mod projects;
mod reports;
mod tasks;
mod usage;

use std::sync::Arc;

use annotation_core::LabelSchema;
use annotation_db::{Db, Project, Task};

use crate::app::AppConfig;
use crate::error::{AppError, Result};

pub use completions::CompletionsService;
pub use projects::ProjectsService;
pub use reports::ReportsService;
pub use tasks::TasksService;
pub use usage::UsageService;

type SharedConfig = Arc<AppConfig>;

/// Service registry for app-level operations.
#[derive(Clone)]
pub struct AppServices {
    pub projects: ProjectsService,
    pub tasks: TasksService,
    pub completions: CompletionsService,
    pub usage: UsageService,
    pub reports: ReportsService,
}

impl AppServices {
    pub fn new(config: &AppConfig) -> Self {
        let shared = Arc::new(config.clone());
        Self {
            projects: ProjectsService::new(shared.clone()),
            tasks: TasksService::new(shared.clone()),
            completions: CompletionsService::new(shared.clone()),
            usage: UsageService::new(shared.clone()),
            reports: ReportsService::new(shared),
        }
    }
}

fn open_db(config: &SharedConfig) -> Result<Db> {
    Ok(Db::open(&config.db_path)?)
}

fn require_project(db: &Db, name: &str) -> Result<Project> {
    db.project_by_name(name)?
        .ok_or_else(|| AppError::NotFound(format!("project '{}' not found", name)))
}

fn require_task(db: &Db, project: &Project, task_id: i64) -> Result<Task> {
    db.get_task(project.id, task_id)?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
}

fn project_schema(project: &Project) -> Result<LabelSchema> {
    Ok(LabelSchema::parse(&project.label_config)?)
}
