//! Stored artifact handlers

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use crate::{AppState, AppError, AppResult};
use crate::models::{TreeEntry, TreeSummary};

/// Serve a stored file verbatim
pub async fn get_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<Response> {
    let data = state.store
        .read(&filename)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    let content_type = if filename.to_ascii_lowercase().ends_with(".json") {
        "application/json"
    } else {
        "text/plain; charset=utf-8"
    };

    Ok(([(header::CONTENT_TYPE, content_type)], data).into_response())
}

/// Process tree statistics for a stored artifact
pub async fn summary(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<Json<TreeSummary>> {
    let data = state.store
        .read(&filename)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    let entries: Vec<TreeEntry> = serde_json::from_slice(&data)
        .map_err(|e| AppError::ValidationError(format!("Not a process artifact: {}", e)))?;

    Ok(Json(TreeSummary::from_entries(&entries)))
}
