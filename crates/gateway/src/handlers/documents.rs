//! Document upload and retrieval handlers

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use quarry_common::{
    db::models::{Document, DocumentStatus, FileKind},
    errors::{AppError, Result},
    metrics::{record_upload, record_upload_rejected},
};
use quarry_extractor::intake::{self, UploadKind};

/// Response after accepting an upload
#[derive(Serialize)]
pub struct UploadResponse {
    pub document_id: Uuid,
    pub filename: String,
    pub file_kind: String,
    pub status: String,
    pub poll_url: String,
}

/// Full document view
#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub filename: String,
    pub file_kind: String,
    pub status: String,
    pub byte_size: i64,
    pub checksum: String,
    pub content_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Document> for DocumentResponse {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            content_length: document.content_length(),
            filename: document.filename,
            file_kind: document.file_kind,
            status: document.status,
            byte_size: document.byte_size,
            checksum: document.checksum,
            error_message: document.error_message,
            metadata: document.metadata,
            created_at: document.created_at.to_rfc3339(),
            updated_at: document.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub kind: Option<String>,
    pub status: Option<String>,
}

fn default_limit() -> u64 {
    50
}

#[derive(Serialize)]
pub struct ListResponse {
    pub documents: Vec<DocumentResponse>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Serialize)]
pub struct StructureResponse {
    pub structure_type: String,
    pub content: String,
    pub position: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
}

#[derive(Serialize)]
pub struct ContentResponse {
    pub document_id: Uuid,
    pub content: String,
    pub content_length: usize,
    pub truncated: bool,
    pub structures: Vec<StructureResponse>,
}

#[derive(Serialize)]
pub struct EntityResponse {
    pub id: Uuid,
    pub text: String,
    pub label: String,
    pub confidence: f64,
    pub start_offset: i64,
    pub end_offset: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Serialize)]
pub struct CategoryResponse {
    pub category: String,
    pub confidence: f64,
    pub keywords: serde_json::Value,
}

#[derive(Deserialize)]
pub struct UpdateDocumentRequest {
    pub metadata: serde_json::Value,
}

/// Read the multipart body, validate it against the declared upload kind,
/// persist the blob, and create the `pending` document row.
///
/// Blob and row are both-or-neither: a failed insert removes the blob.
pub(crate) async fn accept_upload(
    state: &AppState,
    kind: UploadKind,
    mut multipart: Multipart,
) -> Result<Document> {
    let mut filename = None;
    let mut bytes: Option<Vec<u8>> = None;
    let mut client_metadata = serde_json::Map::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::Validation {
        message: format!("malformed multipart body: {}", e),
        field: None,
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                let data = field.bytes().await.map_err(|e| AppError::Validation {
                    message: format!("failed to read file field: {}", e),
                    field: Some("file".to_string()),
                })?;
                bytes = Some(data.to_vec());
            }
            "metadata" => {
                let data = field.bytes().await.map_err(|e| AppError::Validation {
                    message: format!("failed to read metadata field: {}", e),
                    field: Some("metadata".to_string()),
                })?;
                let value: serde_json::Value = serde_json::from_slice(&data)?;
                match value {
                    serde_json::Value::Object(map) => client_metadata = map,
                    _ => {
                        return Err(AppError::Validation {
                            message: "metadata must be a JSON object".to_string(),
                            field: Some("metadata".to_string()),
                        });
                    }
                }
            }
            _ => {}
        }
    }

    let filename = filename.unwrap_or_default();
    let bytes = bytes.ok_or_else(|| AppError::MissingField {
        field: "file".to_string(),
    })?;

    let file_kind = intake::validate_upload(kind, &filename, bytes.len(), &state.config.limits)
        .inspect_err(|e| record_upload_rejected(&format!("{:?}", e.code())))?;

    let extension = intake::file_extension(&filename).unwrap_or_default();
    let blob = state.storage.store_upload(&extension, &bytes).await?;

    client_metadata.insert(
        "upload_kind".to_string(),
        serde_json::json!(kind.as_str()),
    );

    let created = state
        .repository()
        .create_document(
            filename,
            file_kind,
            blob.storage_name.clone(),
            blob.byte_size,
            blob.checksum,
            serde_json::Value::Object(client_metadata),
        )
        .await;

    match created {
        Ok(document) => {
            record_upload(file_kind.as_str());
            tracing::info!(
                document_id = %document.id,
                kind = file_kind.as_str(),
                bytes = document.byte_size,
                "Upload accepted"
            );
            Ok(document)
        }
        Err(e) => {
            // Roll the blob back so no orphan file outlives the failed row
            if let Err(cleanup) = state.storage.remove(&blob.storage_name).await {
                tracing::warn!(error = %cleanup, "Failed to remove orphaned blob");
            }
            Err(e)
        }
    }
}

/// Undo a freshly accepted upload (row + blob) after a queue rejection, so
/// the upload fails whole instead of leaving an unprocessable document.
pub(crate) async fn rollback_upload(state: &AppState, document: &Document) {
    let _ = state.repository().delete_document(document.id).await;
    let _ = state
        .storage
        .remove_document_blobs(&document.storage_name, document.id)
        .await;
}

/// Enqueue extraction for a freshly created document; on queue rejection the
/// document and blob are removed again.
pub(crate) async fn enqueue_or_rollback(state: &AppState, document: &Document) -> Result<()> {
    if let Err(e) = state.jobs.enqueue(document.id) {
        tracing::error!(document_id = %document.id, error = %e, "Could not enqueue extraction");
        rollback_upload(state, document).await;
        return Err(e);
    }
    Ok(())
}

/// Upload a document (pdf/docx/txt) and start asynchronous extraction
pub async fn upload_document(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let document = accept_upload(&state, UploadKind::Document, multipart).await?;
    enqueue_or_rollback(&state, &document).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            document_id: document.id,
            poll_url: format!("/api/v1/documents/{}", document.id),
            filename: document.filename,
            file_kind: document.file_kind,
            status: document.status,
        }),
    ))
}

/// Get document metadata and status
pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<DocumentResponse>> {
    let document = state
        .repository()
        .find_document(document_id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound {
            id: document_id.to_string(),
        })?;

    Ok(Json(document.into()))
}

fn parse_kind(kind: &str) -> Result<FileKind> {
    match kind {
        "pdf" => Ok(FileKind::Pdf),
        "docx" => Ok(FileKind::Docx),
        "txt" => Ok(FileKind::Txt),
        "image" => Ok(FileKind::Image),
        "video" => Ok(FileKind::Video),
        other => Err(AppError::Validation {
            message: format!("unknown file kind: {}", other),
            field: Some("kind".to_string()),
        }),
    }
}

fn parse_status(status: &str) -> Result<DocumentStatus> {
    match status {
        "pending" => Ok(DocumentStatus::Pending),
        "processing" => Ok(DocumentStatus::Processing),
        "completed" => Ok(DocumentStatus::Completed),
        "failed" => Ok(DocumentStatus::Failed),
        other => Err(AppError::Validation {
            message: format!("unknown status: {}", other),
            field: Some("status".to_string()),
        }),
    }
}

/// List documents with optional kind/status filters
pub async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>> {
    let kind = query.kind.as_deref().map(parse_kind).transpose()?;
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let limit = query.limit.clamp(1, 500);

    let (documents, total) = state
        .repository()
        .list_documents(kind, status, query.offset, limit)
        .await?;

    Ok(Json(ListResponse {
        documents: documents.into_iter().map(Into::into).collect(),
        total,
        offset: query.offset,
        limit,
    }))
}

/// Get extracted text and structural breakdown
pub async fn get_content(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<ContentResponse>> {
    let repository = state.repository();

    let document = repository
        .find_document(document_id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound {
            id: document_id.to_string(),
        })?;

    let Some(content) = document.content else {
        return Err(AppError::DocumentNotReady {
            id: document_id.to_string(),
            status: document.status,
        });
    };

    let structures = repository
        .structures_by_document(document_id)
        .await?
        .into_iter()
        .map(|s| StructureResponse {
            structure_type: s.structure_type,
            content: s.content,
            position: s.position,
            level: s.level,
        })
        .collect();

    let truncated = document
        .metadata
        .get("truncated")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    Ok(Json(ContentResponse {
        document_id,
        content_length: content.chars().count(),
        content,
        truncated,
        structures,
    }))
}

/// Get entities extracted from a document
pub async fn get_entities(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<Vec<EntityResponse>>> {
    let repository = state.repository();

    repository
        .find_document(document_id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound {
            id: document_id.to_string(),
        })?;

    let entities = repository
        .entities_by_document(document_id)
        .await?
        .into_iter()
        .map(|e| EntityResponse {
            id: e.id,
            text: e.text,
            label: e.label,
            confidence: e.confidence,
            start_offset: e.start_offset,
            end_offset: e.end_offset,
            context: e.context,
        })
        .collect();

    Ok(Json(entities))
}

/// Get content categories assigned to a document
pub async fn get_categories(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<Vec<CategoryResponse>>> {
    let repository = state.repository();

    repository
        .find_document(document_id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound {
            id: document_id.to_string(),
        })?;

    let categories = repository
        .categories_by_document(document_id)
        .await?
        .into_iter()
        .map(|c| CategoryResponse {
            category: c.category,
            confidence: c.confidence,
            keywords: c.keywords,
        })
        .collect();

    Ok(Json(categories))
}

/// Merge a metadata patch into a document
pub async fn patch_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(request): Json<UpdateDocumentRequest>,
) -> Result<Json<DocumentResponse>> {
    if !request.metadata.is_object() {
        return Err(AppError::Validation {
            message: "metadata must be a JSON object".to_string(),
            field: Some("metadata".to_string()),
        });
    }

    let document = state
        .repository()
        .update_metadata(document_id, request.metadata)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound {
            id: document_id.to_string(),
        })?;

    Ok(Json(document.into()))
}

/// Delete a document; child records cascade, blobs are removed afterwards
pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<StatusCode> {
    let repository = state.repository();

    let document = repository
        .find_document(document_id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound {
            id: document_id.to_string(),
        })?;

    repository.delete_document(document_id).await?;

    if let Err(e) = state
        .storage
        .remove_document_blobs(&document.storage_name, document_id)
        .await
    {
        tracing::warn!(document_id = %document_id, error = %e, "Blob cleanup failed after delete");
    }

    tracing::info!(document_id = %document_id, "Document deleted");
    Ok(StatusCode::NO_CONTENT)
}
