//! Image upload handler
//!
//! Images run through the same pipeline as documents; the handler waits a
//! bounded time on the job's completion signal so it can answer with the
//! OCR text inline, degrading to a poll-style 202 when the budget elapses.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use super::documents::{accept_upload, rollback_upload};
use crate::AppState;
use quarry_common::errors::{AppError, Result};
use quarry_extractor::intake::UploadKind;
use quarry_extractor::JobOutcome;

#[derive(Serialize)]
pub struct ImageUploadResponse {
    pub document_id: Uuid,
    pub status: String,
    /// Recognized text; empty when the image holds none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Mean OCR word confidence in [0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub poll_url: String,
}

/// Upload an image and return OCR text inline when it finishes in time
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ImageUploadResponse>)> {
    let document = accept_upload(&state, UploadKind::Image, multipart).await?;
    let document_id = document.id;
    let poll_url = format!("/api/v1/documents/{}", document_id);

    let wait = Duration::from_secs(state.config.ocr.inline_wait_secs);
    let outcome = match state.jobs.enqueue_and_wait(document_id, wait).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(document_id = %document_id, error = %e, "Could not enqueue OCR job");
            rollback_upload(&state, &document).await;
            return Err(e);
        }
    };

    match outcome {
        Some(JobOutcome::Completed) => {
            let document = state
                .repository()
                .find_document(document_id)
                .await?
                .ok_or_else(|| AppError::DocumentNotFound {
                    id: document_id.to_string(),
                })?;

            let confidence = document
                .metadata
                .get("ocr_confidence")
                .and_then(|v| v.as_f64());

            Ok((
                StatusCode::OK,
                Json(ImageUploadResponse {
                    document_id,
                    status: document.status.clone(),
                    text: document.content,
                    confidence,
                    error_message: None,
                    poll_url,
                }),
            ))
        }
        Some(JobOutcome::Failed(message)) => Ok((
            StatusCode::OK,
            Json(ImageUploadResponse {
                document_id,
                status: "failed".to_string(),
                text: None,
                confidence: None,
                error_message: Some(message),
                poll_url,
            }),
        )),
        // Still running (or the job was skipped): poll later
        _ => Ok((
            StatusCode::ACCEPTED,
            Json(ImageUploadResponse {
                document_id,
                status: "processing".to_string(),
                text: None,
                confidence: None,
                error_message: None,
                poll_url,
            }),
        )),
    }
}
