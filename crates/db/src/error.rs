#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("project {0} not found")]
    ProjectNotFound(i64),
}

pub type Result<T> = std::result::Result<T, DbError>;
