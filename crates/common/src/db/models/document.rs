//! Document entity
//!
//! One row per uploaded artifact, tracked through the extraction pipeline.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Processing status enum
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }

    /// Whether moving to `next` respects the monotonic lifecycle
    /// pending -> processing -> {completed | failed}
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (DocumentStatus::Pending, DocumentStatus::Processing)
                | (DocumentStatus::Processing, DocumentStatus::Completed)
                | (DocumentStatus::Processing, DocumentStatus::Failed)
        )
    }
}

impl From<String> for DocumentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "processing" => DocumentStatus::Processing,
            "completed" => DocumentStatus::Completed,
            "failed" => DocumentStatus::Failed,
            _ => DocumentStatus::Pending,
        }
    }
}

impl From<DocumentStatus> for String {
    fn from(status: DocumentStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Concrete file format of an uploaded artifact
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Pdf,
    Docx,
    Txt,
    Image,
    Video,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Docx => "docx",
            FileKind::Txt => "txt",
            FileKind::Image => "image",
            FileKind::Video => "video",
        }
    }
}

impl From<String> for FileKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pdf" => FileKind::Pdf,
            "docx" => FileKind::Docx,
            "image" => FileKind::Image,
            "video" => FileKind::Video,
            _ => FileKind::Txt,
        }
    }
}

impl From<FileKind> for String {
    fn from(kind: FileKind) -> Self {
        kind.as_str().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub filename: String,

    #[sea_orm(column_type = "Text")]
    pub file_kind: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    /// Extracted textual content; null until the pipeline completes
    #[sea_orm(column_type = "Text", nullable)]
    pub content: Option<String>,

    /// System-assigned blob name, decoupled from the client filename
    #[sea_orm(column_type = "Text", unique)]
    pub storage_name: String,

    pub byte_size: i64,

    /// SHA-256 of the uploaded bytes
    #[sea_orm(column_type = "Text")]
    pub checksum: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,

    /// Extensible metadata as JSONB
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: serde_json::Value,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the processing status as an enum
    pub fn document_status(&self) -> DocumentStatus {
        DocumentStatus::from(self.status.clone())
    }

    /// Get the file kind as an enum
    pub fn kind(&self) -> FileKind {
        FileKind::from(self.file_kind.clone())
    }

    /// Check if the document is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.document_status(),
            DocumentStatus::Completed | DocumentStatus::Failed
        )
    }

    /// Length of the extracted content, in characters
    pub fn content_length(&self) -> usize {
        self.content.as_ref().map(|c| c.chars().count()).unwrap_or(0)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::knowledge_entity::Entity")]
    Entities,

    #[sea_orm(has_many = "super::content_category::Entity")]
    Categories,

    #[sea_orm(has_many = "super::key_phrase::Entity")]
    KeyPhrases,

    #[sea_orm(has_many = "super::document_structure::Entity")]
    Structures,

    #[sea_orm(has_many = "super::knowledge_relationship::Entity")]
    Relationships,

    #[sea_orm(has_many = "super::video_frame::Entity")]
    Frames,
}

impl Related<super::knowledge_entity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entities.def()
    }
}

impl Related<super::content_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl Related<super::video_frame::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Frames.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        let status = DocumentStatus::from("processing".to_string());
        assert_eq!(status, DocumentStatus::Processing);
        assert_eq!(String::from(status), "processing");
    }

    #[test]
    fn test_monotonic_transitions() {
        use DocumentStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        // No backward or skipping moves
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
    }
}
