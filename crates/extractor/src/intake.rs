//! Upload intake rules
//!
//! Pure functions mapping a declared upload kind plus filename/size onto a
//! concrete `FileKind`, or a rejection. No document row is created when any
//! of these checks fail.

use quarry_common::config::LimitsConfig;
use quarry_common::db::models::FileKind;
use quarry_common::errors::AppError;

/// Declared upload kind, taken from the route the client used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Document,
    Image,
    Video,
}

impl UploadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Document => "document",
            UploadKind::Image => "image",
            UploadKind::Video => "video",
        }
    }

    /// Extensions accepted for this upload kind
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            UploadKind::Document => &["pdf", "docx", "txt"],
            UploadKind::Image => &["png", "jpg", "jpeg", "tiff"],
            UploadKind::Video => &["mp4", "avi", "mov"],
        }
    }

    /// Upload size ceiling for this kind, in bytes
    pub fn max_bytes(&self, limits: &LimitsConfig) -> usize {
        match self {
            UploadKind::Document => limits.max_document_bytes,
            UploadKind::Image => limits.max_image_bytes,
            UploadKind::Video => limits.max_video_bytes,
        }
    }
}

/// Lowercased extension of a filename, if any
pub fn file_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Map an accepted extension onto the concrete file kind
fn kind_for_extension(ext: &str) -> Option<FileKind> {
    match ext {
        "pdf" => Some(FileKind::Pdf),
        "docx" => Some(FileKind::Docx),
        "txt" => Some(FileKind::Txt),
        "png" | "jpg" | "jpeg" | "tiff" => Some(FileKind::Image),
        "mp4" | "avi" | "mov" => Some(FileKind::Video),
        _ => None,
    }
}

/// Validate an upload against the declared kind's rules.
///
/// Returns the concrete file kind on success. Checks run in a fixed order:
/// filename, body, extension, size.
pub fn validate_upload(
    kind: UploadKind,
    filename: &str,
    byte_size: usize,
    limits: &LimitsConfig,
) -> Result<FileKind, AppError> {
    if filename.trim().is_empty() {
        return Err(AppError::Validation {
            message: "no filename provided".to_string(),
            field: Some("file".to_string()),
        });
    }

    if byte_size == 0 {
        return Err(AppError::Validation {
            message: "file body is empty".to_string(),
            field: Some("file".to_string()),
        });
    }

    let extension = file_extension(filename).ok_or_else(|| AppError::UnsupportedFormat {
        extension: String::new(),
        kind: kind.as_str().to_string(),
    })?;

    if !kind.allowed_extensions().contains(&extension.as_str()) {
        return Err(AppError::UnsupportedFormat {
            extension,
            kind: kind.as_str().to_string(),
        });
    }

    let limit = kind.max_bytes(limits);
    if byte_size > limit {
        return Err(AppError::PayloadTooLarge {
            size: byte_size,
            limit,
        });
    }

    // The allow-list above guarantees the extension maps to a kind
    kind_for_extension(&extension).ok_or_else(|| AppError::UnsupportedFormat {
        extension,
        kind: kind.as_str().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> LimitsConfig {
        LimitsConfig {
            max_document_bytes: 100,
            max_image_bytes: 50,
            max_video_bytes: 200,
        }
    }

    #[test]
    fn test_accepts_supported_document_formats() {
        let limits = limits();
        assert_eq!(
            validate_upload(UploadKind::Document, "manual.pdf", 10, &limits).unwrap(),
            FileKind::Pdf
        );
        assert_eq!(
            validate_upload(UploadKind::Document, "Manual.DOCX", 10, &limits).unwrap(),
            FileKind::Docx
        );
        assert_eq!(
            validate_upload(UploadKind::Document, "notes.txt", 10, &limits).unwrap(),
            FileKind::Txt
        );
    }

    #[test]
    fn test_rejects_disallowed_extension_for_kind() {
        let limits = limits();
        // A valid image extension is still not a document
        let err = validate_upload(UploadKind::Document, "photo.png", 10, &limits).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat { .. }));

        let err = validate_upload(UploadKind::Image, "clip.mp4", 10, &limits).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat { .. }));

        let err = validate_upload(UploadKind::Video, "script.exe", 10, &limits).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_rejects_missing_extension_and_empty_names() {
        let limits = limits();
        assert!(validate_upload(UploadKind::Document, "README", 10, &limits).is_err());
        assert!(validate_upload(UploadKind::Document, ".pdf", 10, &limits).is_err());
        assert!(validate_upload(UploadKind::Document, "  ", 10, &limits).is_err());
    }

    #[test]
    fn test_rejects_empty_body() {
        let err = validate_upload(UploadKind::Document, "a.pdf", 0, &limits()).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_enforces_per_kind_size_ceiling() {
        let limits = limits();
        let err = validate_upload(UploadKind::Image, "a.png", 51, &limits).unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { limit: 50, .. }));

        // The same size is fine for a video
        assert!(validate_upload(UploadKind::Video, "a.mp4", 51, &limits).is_ok());
    }
}
