pub mod app;
pub mod config;
pub mod error;
pub mod services;
pub mod startup;
pub mod util;

pub use app::{AppConfig, AppState};
pub use config::{ExportParams, PatchParams, ReportParams, TaskImport};
pub use error::{ApiError, AppError, Result};
pub use services::AppServices;
pub use startup::{AppPaths, ensure_app_data_dir};
pub use util::time::{normalize_rfc3339_to_utc, now_rfc3339};
