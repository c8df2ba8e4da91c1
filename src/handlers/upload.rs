//! Upload handler

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;

use crate::{AppState, AppError, AppResult};
use crate::models::TreeSummary;
use crate::parser;
use crate::storage::{allowed_file, artifact_name, secure_filename};

/// Multipart field carrying the listing
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub json_file: String,
    pub annotated: bool,
    pub summary: TreeSummary,
}

/// Accept a process listing, parse it, annotate it and store the JSON artifact
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let (client_name, data) = read_file_field(&mut multipart)
        .await?
        .ok_or(AppError::NoFileSelected)?;

    if client_name.is_empty() {
        return Err(AppError::NoFileSelected);
    }
    if !allowed_file(&client_name) {
        return Err(AppError::InvalidFileType);
    }

    let filename = secure_filename(&client_name);
    if filename.is_empty() {
        return Err(AppError::ValidationError("Invalid file name".to_string()));
    }

    state.store.save_upload(&filename, &data).await?;
    tracing::info!("Received listing {} ({} bytes)", filename, data.len());

    let outcome = parser::parse_listing_bytes(&data)?;
    let count = outcome.count;

    let records = match &state.annotator {
        Some(annotator) => annotator.annotate(outcome.records).await,
        None => outcome.records,
    };

    let json_file = artifact_name(&filename);
    state.store.write_artifact(&json_file, &records).await?;

    tracing::info!("Processed {}: {} processes -> {}", filename, count, json_file);

    Ok(Json(UploadResponse {
        success: true,
        message: format!("File processed successfully. Found {} processes.", count),
        json_file,
        annotated: state.annotator.is_some(),
        summary: TreeSummary::from_records(&records),
    }))
}

/// First `file` field as (client filename, contents)
async fn read_file_field(multipart: &mut Multipart) -> AppResult<Option<(String, Bytes)>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        return Ok(Some((file_name, data)));
    }

    Ok(None)
}
