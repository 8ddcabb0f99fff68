//! Video upload and frame retrieval handlers

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use super::documents::{accept_upload, rollback_upload};
use crate::AppState;
use quarry_common::errors::{AppError, Result};
use quarry_extractor::intake::UploadKind;
use quarry_extractor::JobOutcome;

#[derive(Serialize)]
pub struct VideoUploadResponse {
    pub document_id: Uuid,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<usize>,
    /// First few frames, base64-encoded JPEG, for immediate display
    pub preview_frames: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub poll_url: String,
}

/// Upload a video; frames are sampled asynchronously and a preview subset
/// is returned inline when sampling finishes within the wait budget
pub async fn upload_video(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<VideoUploadResponse>)> {
    let document = accept_upload(&state, UploadKind::Video, multipart).await?;
    let document_id = document.id;
    let poll_url = format!("/api/v1/documents/{}", document_id);

    let wait = Duration::from_secs(state.config.video.inline_wait_secs);
    let outcome = match state.jobs.enqueue_and_wait(document_id, wait).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(document_id = %document_id, error = %e, "Could not enqueue sampling job");
            rollback_upload(&state, &document).await;
            return Err(e);
        }
    };

    match outcome {
        Some(JobOutcome::Completed) => {
            let frames = state.repository().frames_by_document(document_id).await?;

            let mut preview_frames = Vec::new();
            for frame in frames.iter().take(state.config.video.preview_count) {
                match state.storage.read(&frame.storage_name).await {
                    Ok(bytes) => preview_frames.push(BASE64.encode(bytes)),
                    Err(e) => {
                        tracing::warn!(
                            document_id = %document_id,
                            frame = frame.frame_index,
                            error = %e,
                            "Preview frame unreadable"
                        );
                    }
                }
            }

            Ok((
                StatusCode::OK,
                Json(VideoUploadResponse {
                    document_id,
                    status: "completed".to_string(),
                    frame_count: Some(frames.len()),
                    preview_frames,
                    error_message: None,
                    poll_url,
                }),
            ))
        }
        Some(JobOutcome::Failed(message)) => Ok((
            StatusCode::OK,
            Json(VideoUploadResponse {
                document_id,
                status: "failed".to_string(),
                frame_count: None,
                preview_frames: Vec::new(),
                error_message: Some(message),
                poll_url,
            }),
        )),
        _ => Ok((
            StatusCode::ACCEPTED,
            Json(VideoUploadResponse {
                document_id,
                status: "processing".to_string(),
                frame_count: None,
                preview_frames: Vec::new(),
                error_message: None,
                poll_url,
            }),
        )),
    }
}

/// Fetch one extracted frame by index
pub async fn get_frame(
    State(state): State<AppState>,
    Path((document_id, index)): Path<(Uuid, i64)>,
) -> Result<Response> {
    let repository = state.repository();

    repository
        .find_document(document_id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound {
            id: document_id.to_string(),
        })?;

    let frame = repository
        .find_frame(document_id, index)
        .await?
        .ok_or_else(|| AppError::FrameNotFound {
            id: document_id.to_string(),
            index,
        })?;

    let bytes = state.storage.read(&frame.storage_name).await?;
    let content_type = mime_guess::from_path(&frame.storage_name)
        .first_or_octet_stream()
        .to_string();

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
