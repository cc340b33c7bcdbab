use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("db error: {0}")]
    Db(#[from] annotation_db::DbError),
    #[error("{0}")]
    Schema(#[from] annotation_core::SchemaParseError),
    #[error("{0}")]
    Validation(#[from] annotation_core::ValidationError),
    #[error("report error: {0}")]
    Report(#[from] reporting::ReportError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    /// The completion is in a state that does not allow the operation.
    #[error("{0}")]
    Conflict(String),
    /// Disabled by server configuration.
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let (status, code) = match &err {
            AppError::Schema(_) => (400, Some("invalid_label_config".to_string())),
            AppError::Validation(_) => (400, Some("invalid_completion".to_string())),
            AppError::Report(reporting::ReportError::AssertionOnRegion)
            | AppError::InvalidInput(_) => (400, Some("invalid_input".to_string())),
            AppError::NotFound(_) => (404, Some("not_found".to_string())),
            AppError::Conflict(_) => (409, Some("conflict".to_string())),
            AppError::Forbidden(_) => (422, Some("forbidden".to_string())),
            AppError::Db(_)
            | AppError::Report(_)
            | AppError::Io(_)
            | AppError::Serde(_)
            | AppError::Message(_) => (500, None),
        };
        Self {
            status,
            message: err.to_string(),
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_errors_map_to_statuses() {
        let cases = [
            (AppError::InvalidInput("bad".to_string()), 400),
            (AppError::NotFound("Completion not found".to_string()), 404),
            (AppError::Conflict("submitted".to_string()), 409),
            (AppError::Forbidden("disabled".to_string()), 422),
            (AppError::Message("boom".to_string()), 500),
            (
                AppError::Validation(annotation_core::ValidationError::LeadTime),
                400,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn validation_message_is_surfaced() {
        let err = AppError::Validation(annotation_core::ValidationError::InvalidLabel {
            result_type: "labels".to_string(),
            label: "LOCATION".to_string(),
        });
        let api = ApiError::from(err);
        assert_eq!(api.message, "Invalid labels: LOCATION");
        assert_eq!(api.code.as_deref(), Some("invalid_completion"));
    }
}
