//! Blob storage for uploaded artifacts and extracted video frames
//!
//! Files are stored under a system-assigned name derived from a UUID, never
//! the client-supplied filename, so uploads cannot collide or traverse out
//! of the storage root.

use crate::errors::{AppError, Result};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Subdirectory for extracted video frames
const FRAMES_DIR: &str = "frames";

/// Outcome of persisting an upload
#[derive(Debug, Clone)]
pub struct StoredBlob {
    /// System-assigned name, relative to the storage root
    pub storage_name: String,
    pub byte_size: i64,
    /// SHA-256 of the stored bytes, hex-encoded
    pub checksum: String,
}

/// Filesystem-backed blob store
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the storage directories if they do not exist
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        fs::create_dir_all(self.root.join(FRAMES_DIR)).await?;
        Ok(())
    }

    /// Persist uploaded bytes under a fresh storage name.
    ///
    /// The caller is responsible for removing the blob again if the
    /// accompanying database insert fails (both-or-neither contract).
    pub async fn store_upload(&self, extension: &str, bytes: &[u8]) -> Result<StoredBlob> {
        let ext: String = extension
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        let storage_name = if ext.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            format!("{}.{}", Uuid::new_v4(), ext)
        };

        let path = self.root.join(&storage_name);
        fs::write(&path, bytes).await.map_err(|e| AppError::StorageFailure {
            message: format!("failed to write {}: {}", storage_name, e),
        })?;

        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let checksum = hex::encode(hasher.finalize());

        Ok(StoredBlob {
            storage_name,
            byte_size: bytes.len() as i64,
            checksum,
        })
    }

    /// Absolute path of a stored blob
    pub fn path_of(&self, storage_name: &str) -> Result<PathBuf> {
        Ok(self.root.join(Self::validate_name(storage_name)?))
    }

    /// Read a stored blob
    pub async fn read(&self, storage_name: &str) -> Result<Vec<u8>> {
        let path = self.path_of(storage_name)?;
        fs::read(&path).await.map_err(|e| AppError::StorageFailure {
            message: format!("failed to read {}: {}", storage_name, e),
        })
    }

    /// Remove a stored blob; missing files are not an error
    pub async fn remove(&self, storage_name: &str) -> Result<()> {
        let path = self.path_of(storage_name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::StorageFailure {
                message: format!("failed to remove {}: {}", storage_name, e),
            }),
        }
    }

    /// Directory holding the extracted frames of one video document
    pub fn frames_dir(&self, document_id: Uuid) -> PathBuf {
        self.root.join(FRAMES_DIR).join(document_id.to_string())
    }

    /// Storage name of one frame file, relative to the root
    pub fn frame_storage_name(document_id: Uuid, filename: &str) -> String {
        format!("{}/{}/{}", FRAMES_DIR, document_id, filename)
    }

    /// Remove the original blob and any frame files of a document
    pub async fn remove_document_blobs(
        &self,
        storage_name: &str,
        document_id: Uuid,
    ) -> Result<()> {
        self.remove(storage_name).await?;

        let frames = self.frames_dir(document_id);
        match fs::remove_dir_all(&frames).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::StorageFailure {
                message: format!("failed to remove frames of {}: {}", document_id, e),
            }),
        }
    }

    /// Reject names that would escape the storage root
    fn validate_name(storage_name: &str) -> Result<&Path> {
        let path = Path::new(storage_name);
        let safe = path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

        if storage_name.is_empty() || !safe {
            return Err(AppError::StorageFailure {
                message: format!("invalid storage name: {:?}", storage_name),
            });
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, BlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn test_store_read_remove_roundtrip() {
        let (_dir, store) = store();
        store.init().await.unwrap();

        let blob = store.store_upload("PDF", b"hello world").await.unwrap();
        assert!(blob.storage_name.ends_with(".pdf"));
        assert_eq!(blob.byte_size, 11);

        let bytes = store.read(&blob.storage_name).await.unwrap();
        assert_eq!(bytes, b"hello world");

        store.remove(&blob.storage_name).await.unwrap();
        assert!(store.read(&blob.storage_name).await.is_err());
        // Removing again is fine
        store.remove(&blob.storage_name).await.unwrap();
    }

    #[tokio::test]
    async fn test_checksum_is_sha256() {
        let (_dir, store) = store();
        store.init().await.unwrap();

        let blob = store.store_upload("txt", b"hello").await.unwrap();
        assert_eq!(
            blob.checksum,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[tokio::test]
    async fn test_traversal_names_rejected() {
        let (_dir, store) = store();
        store.init().await.unwrap();

        assert!(store.read("../etc/passwd").await.is_err());
        assert!(store.read("/etc/passwd").await.is_err());
        assert!(store.read("").await.is_err());
        assert!(store.remove("a/../../b").await.is_err());
    }

    #[test]
    fn test_frame_storage_name_stays_relative() {
        let id = Uuid::new_v4();
        let name = BlobStore::frame_storage_name(id, "00001.jpg");
        assert!(name.starts_with("frames/"));
        assert!(BlobStore::validate_name(&name).is_ok());
    }
}
