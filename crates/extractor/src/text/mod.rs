//! Text extraction for document uploads
//!
//! Produces plain text plus a structural breakdown (pages, headings,
//! tables, chunks) for PDF, DOCX, and TXT content.

pub mod docx;
pub mod pdf;
pub mod plain;

use crate::errors::ExtractError;
use quarry_common::db::models::FileKind;

/// Kind of a structural unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureType {
    Page,
    Heading,
    Paragraph,
    Table,
    Chunk,
}

impl StructureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StructureType::Page => "page",
            StructureType::Heading => "heading",
            StructureType::Paragraph => "paragraph",
            StructureType::Table => "table",
            StructureType::Chunk => "chunk",
        }
    }
}

/// One structural unit recorded by an extractor
#[derive(Debug, Clone)]
pub struct StructureRecord {
    pub structure_type: StructureType,
    pub content: String,
    /// Ordinal position (page number, chunk index, ...)
    pub position: i64,
    /// Heading level where applicable
    pub level: Option<i64>,
    pub metadata: serde_json::Value,
}

impl StructureRecord {
    pub fn new(structure_type: StructureType, content: String, position: i64) -> Self {
        Self {
            structure_type,
            content,
            position,
            level: None,
            metadata: serde_json::json!({}),
        }
    }
}

/// Result of a text extraction pass
#[derive(Debug, Clone)]
pub struct TextExtraction {
    pub content: String,
    pub structures: Vec<StructureRecord>,
    /// True when the content was cut at `max_content_chars`
    pub truncated: bool,
    /// Length of the full extracted text, in characters
    pub original_chars: usize,
}

/// Extract text and structure from document bytes.
///
/// `chunk_size` drives plain-text chunking; `max_content_chars` bounds the
/// stored content (overflow is truncated, not dropped silently - the caller
/// records the truncation in document metadata).
pub fn extract(
    kind: FileKind,
    bytes: &[u8],
    chunk_size: usize,
    max_content_chars: usize,
) -> Result<TextExtraction, ExtractError> {
    let (content, structures) = match kind {
        FileKind::Pdf => pdf::extract(bytes)?,
        FileKind::Docx => docx::extract(bytes)?,
        FileKind::Txt => plain::extract(bytes, chunk_size)?,
        FileKind::Image | FileKind::Video => {
            return Err(ExtractError::Unreadable(format!(
                "{} is not a text document kind",
                kind.as_str()
            )));
        }
    };

    Ok(enforce_limit(content, structures, max_content_chars))
}

/// Cut content at a character boundary when it exceeds the limit
fn enforce_limit(
    content: String,
    structures: Vec<StructureRecord>,
    max_content_chars: usize,
) -> TextExtraction {
    let original_chars = content.chars().count();

    if original_chars <= max_content_chars {
        return TextExtraction {
            content,
            structures,
            truncated: false,
            original_chars,
        };
    }

    let cut = content
        .char_indices()
        .nth(max_content_chars)
        .map(|(i, _)| i)
        .unwrap_or(content.len());

    TextExtraction {
        content: content[..cut].to_string(),
        structures,
        truncated: true,
        original_chars,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_truncation_below_limit() {
        let result = enforce_limit("short".to_string(), vec![], 100);
        assert!(!result.truncated);
        assert_eq!(result.content, "short");
        assert_eq!(result.original_chars, 5);
    }

    #[test]
    fn test_truncation_at_char_boundary() {
        // Multi-byte characters must not be split
        let text = "äöü".repeat(10);
        let result = enforce_limit(text, vec![], 7);
        assert!(result.truncated);
        assert_eq!(result.content.chars().count(), 7);
        assert_eq!(result.original_chars, 30);
    }

    #[test]
    fn test_image_bytes_are_not_a_text_kind() {
        assert!(extract(FileKind::Image, b"\x89PNG", 100, 100).is_err());
    }
}
