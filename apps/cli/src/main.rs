mod args;
mod config;
mod dirs;

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use annotation_app::{
    ApiError, AppConfig, AppError, AppPaths, AppState, ExportParams, PatchParams, ReportParams,
    TaskImport, ensure_app_data_dir,
};
use clap::Parser;
use serde::Serialize;
use serde_json::{Value, json};

use args::{Cli, Command, ReportKind};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("annotrack_cli=info,annotation_app=info")
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            let api = ApiError::from(err);
            tracing::debug!(status = api.status, "command failed");
            match serde_json::to_string_pretty(&api) {
                Ok(body) => eprintln!("{}", body),
                Err(_) => eprintln!("{}", api.message),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> annotation_app::Result<String> {
    let data_dir = dirs::resolve_data_dir(cli.data_dir).map_err(AppError::Message)?;
    let paths = AppPaths::new(data_dir.dir);
    ensure_app_data_dir(&paths)?;
    let load = config::load_or_create(&paths.config_path).map_err(AppError::Message)?;
    if load.created {
        tracing::info!(path = %load.file.display(), "created default config");
    }
    if data_dir.matched_existing {
        tracing::debug!(dir = %paths.app_data_dir.display(), "using existing data dir");
    } else {
        tracing::info!(dir = %paths.app_data_dir.display(), "using new data dir");
    }

    let username = cli.user.unwrap_or(load.config.username);
    let state = AppState::new(AppConfig {
        db_path: paths.db_path,
        allow_delete_completions: load.config.allow_delete_completions,
        app_version: load
            .config
            .app_version
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
    });
    state.initialize()?;
    let services = &state.services;

    let output = match cli.command {
        Command::InitProject {
            name,
            config,
            legacy,
        } => {
            let label_config = read_text(&config)?;
            to_json(&services.projects.create(&name, &label_config, legacy)?)?
        }
        Command::SetConfig { project, config } => {
            let label_config = read_text(&config)?;
            to_json(&services.projects.set_label_config(&project, &label_config)?)?
        }
        Command::ImportTasks { project, file } => {
            let tasks: Vec<TaskImport> = serde_json::from_value(read_json(&file)?)?;
            let imported = services.tasks.import(&project, tasks, &username)?;
            json!({ "imported": imported })
        }
        Command::TagTask { target, tags } => {
            let tags = services.tasks.tag(&target.project, target.task, &tags)?;
            json!({ "task": target.task, "tags": tags })
        }
        Command::Create {
            target,
            file,
            direct,
        } => {
            let body = read_json(&file)?;
            let id = if direct {
                services
                    .completions
                    .submit_direct(&target.project, target.task, body, &username)?
            } else {
                services
                    .completions
                    .create(&target.project, target.task, body, &username)?
            };
            json!({ "id": id })
        }
        Command::Patch {
            target,
            file,
            current_page,
        } => {
            let body = read_json(&file)?;
            let params = PatchParams { current_page };
            to_json(&services.completions.patch(
                &target.project,
                target.task,
                target.completion,
                body,
                &username,
                &params,
            )?)?
        }
        Command::Delete { target } => {
            services.completions.delete(
                &target.project,
                target.task,
                target.completion,
                &username,
            )?;
            json!({ "deleted": target.completion })
        }
        Command::Review { target, file } => {
            let body = read_json(&file)?;
            to_json(&services.completions.review(
                &target.project,
                target.task,
                target.completion,
                body,
                &username,
            )?)?
        }
        Command::Validate { project, file } => {
            let body = read_json(&file)?;
            match services.projects.validate(&project, &body)? {
                Some(message) => json!({ "valid": false, "message": message }),
                None => json!({ "valid": true }),
            }
        }
        Command::Usage { project } => to_json(&services.usage.labels_info(&project)?)?,
        Command::Report {
            kind,
            project,
            username: filter_user,
            task_ids,
            assertion,
        } => match kind {
            ReportKind::Annotator => {
                let params = ReportParams {
                    username: filter_user,
                    task_ids,
                    assertion,
                };
                to_json(&services.reports.annotator_rows(&project, &params)?)?
            }
            ReportKind::Predictions => to_json(&services.reports.prediction_rows(&project)?)?,
            ReportKind::Chunks => to_json(&services.reports.chunks_by_annotator(&project)?)?,
        },
        Command::Export {
            project,
            tags,
            ground_truth,
            exclude_empty,
        } => {
            let params = ExportParams {
                tags,
                ground_truth_only: ground_truth,
                exclude_tasks_without_completions: exclude_empty,
            };
            to_json(&services.reports.export(&project, &params)?)?
        }
    };

    Ok(serde_json::to_string_pretty(&output)?)
}

fn to_json<T: Serialize>(value: &T) -> annotation_app::Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn read_text(path: &Path) -> annotation_app::Result<String> {
    fs::read_to_string(path)
        .map_err(|err| AppError::InvalidInput(format!("read {}: {}", path.display(), err)))
}

fn read_json(path: &Path) -> annotation_app::Result<Value> {
    let raw = read_text(path)?;
    serde_json::from_str(&raw)
        .map_err(|err| AppError::InvalidInput(format!("parse {}: {}", path.display(), err)))
}
