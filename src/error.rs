//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::parser::ParseError;
use crate::storage::StorageError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Upload errors
    NoFileSelected,
    InvalidFileType,
    ValidationError(String),
    UploadRejected(StatusCode, String),

    // Listing could not be parsed
    Parse(ParseError),

    // Resource errors
    NotFound(String),

    // Storage errors
    StorageError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NoFileSelected => (StatusCode::BAD_REQUEST, "No file selected".to_string()),
            AppError::InvalidFileType => (
                StatusCode::BAD_REQUEST,
                "Invalid file type. Only .txt files are allowed.".to_string(),
            ),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::UploadRejected(status, msg) => (*status, msg.clone()),
            AppError::Parse(err) => {
                tracing::warn!("Listing rejected: {}", err);
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::StorageError(msg) => {
                tracing::error!("Storage error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error occurred".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        AppError::Parse(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::StorageError(err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        // Carries 413 when the body limit was hit
        AppError::UploadRejected(err.status(), err.body_text())
    }
}
