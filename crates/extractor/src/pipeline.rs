//! Extraction pipeline
//!
//! One call processes one claimed document end to end: read the stored
//! blob, run the kind-specific extractor, run the knowledge stage, and
//! persist everything in a single transaction. A wall-clock budget bounds
//! each job; nothing partial is ever persisted because child records only
//! land inside the final transaction.

use crate::errors::ExtractError;
use crate::knowledge;
use crate::ocr::OcrEngine;
use crate::text;
use crate::video::FrameSampler;
use backoff::ExponentialBackoff;
use quarry_common::config::AppConfig;
use quarry_common::db::models::{Document, FileKind};
use quarry_common::db::{
    ExtractionRecords, NewCategory, NewEntity, NewFrame, NewKeyPhrase, NewRelationship,
    NewStructure, Repository,
};
use quarry_common::errors::AppError;
use quarry_common::metrics::record_extraction;
use quarry_common::storage::BlobStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Terminal outcome of one extraction job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed(String),
    /// The document was not claimable (already processed or gone)
    Skipped,
}

impl JobOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Failed(_) => "failed",
            JobOutcome::Skipped => "skipped",
        }
    }
}

/// The extraction pipeline shared by all workers
pub struct ExtractionPipeline {
    repository: Repository,
    store: BlobStore,
    ocr: Arc<dyn OcrEngine>,
    sampler: FrameSampler,
    config: Arc<AppConfig>,
}

impl ExtractionPipeline {
    pub fn new(
        repository: Repository,
        store: BlobStore,
        ocr: Arc<dyn OcrEngine>,
        sampler: FrameSampler,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            repository,
            store,
            ocr,
            sampler,
            config,
        }
    }

    /// Process one document. Claims it first; of two concurrent attempts on
    /// the same document exactly one proceeds past the claim.
    #[instrument(skip(self), fields(document_id = %document_id))]
    pub async fn process(&self, document_id: Uuid) -> JobOutcome {
        let started = Instant::now();

        match self.repository.claim_document(document_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Document not claimable, skipping");
                return JobOutcome::Skipped;
            }
            Err(e) => {
                error!(error = %e, "Failed to claim document");
                return JobOutcome::Failed(e.to_string());
            }
        }

        let document = match self.repository.find_document(document_id).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                warn!("Claimed document disappeared, skipping");
                return JobOutcome::Skipped;
            }
            Err(e) => {
                error!(error = %e, "Failed to load claimed document");
                return JobOutcome::Failed(e.to_string());
            }
        };

        let kind = document.kind();
        let budget = self.config.extraction_timeout();

        let outcome = match tokio::time::timeout(budget, self.extract(&document)).await {
            Err(_) => {
                let message = format!(
                    "TimeoutExceeded: extraction exceeded the {}s wall-clock budget",
                    budget.as_secs()
                );
                self.mark_failed(document_id, &message).await;
                JobOutcome::Failed(message)
            }
            Ok(Err(e)) => {
                let message = e.reason();
                self.mark_failed(document_id, &message).await;
                JobOutcome::Failed(message)
            }
            Ok(Ok(records)) => {
                let entities = records.entities.len();
                match self.persist(document_id, records).await {
                    Ok(true) => {
                        info!(
                            kind = kind.as_str(),
                            entities,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Extraction completed"
                        );
                        JobOutcome::Completed
                    }
                    Ok(false) => {
                        warn!("Document left processing state mid-flight, results discarded");
                        JobOutcome::Skipped
                    }
                    Err(e) => {
                        let message = format!("StorageFailure: could not persist results: {}", e);
                        self.mark_failed(document_id, &message).await;
                        JobOutcome::Failed(message)
                    }
                }
            }
        };

        record_extraction(kind.as_str(), outcome.as_str(), started.elapsed());
        outcome
    }

    /// Persist the completed extraction, retrying transient storage errors
    /// within a bounded window before giving up.
    async fn persist(&self, document_id: Uuid, records: ExtractionRecords) -> Result<bool, AppError> {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(
                self.config.extraction.persist_retry_secs,
            )),
            ..Default::default()
        };

        backoff::future::retry(policy, || {
            let repository = self.repository.clone();
            let records = records.clone();
            async move {
                repository
                    .complete_extraction(document_id, records)
                    .await
                    .map_err(backoff::Error::transient)
            }
        })
        .await
    }

    async fn mark_failed(&self, document_id: Uuid, message: &str) {
        match self.repository.fail_document(document_id, message).await {
            Ok(true) => {}
            Ok(false) => warn!("Document was not in processing state when marked failed"),
            Err(e) => error!(error = %e, "Failed to record extraction failure"),
        }
    }

    /// Dispatch to the extractor matching the document's file kind
    async fn extract(&self, document: &Document) -> Result<ExtractionRecords, ExtractError> {
        match document.kind() {
            FileKind::Pdf | FileKind::Docx | FileKind::Txt => {
                self.extract_text_document(document).await
            }
            FileKind::Image => self.extract_image(document).await,
            FileKind::Video => self.extract_video(document).await,
        }
    }

    async fn extract_text_document(
        &self,
        document: &Document,
    ) -> Result<ExtractionRecords, ExtractError> {
        let bytes = self
            .store
            .read(&document.storage_name)
            .await
            .map_err(|e| ExtractError::Storage(e.to_string()))?;

        let kind = document.kind();
        let chunk_size = self.config.extraction.chunk_size;
        let max_chars = self.config.extraction.max_content_length;

        // Parsing is CPU-bound; keep it off the async workers
        let extraction =
            tokio::task::spawn_blocking(move || text::extract(kind, &bytes, chunk_size, max_chars))
                .await
                .map_err(|e| ExtractError::Unreadable(format!("extraction task failed: {}", e)))??;

        let outcome = knowledge::extract(&extraction.content, &self.config.knowledge);

        let mut patch = serde_json::Map::new();
        patch.insert(
            "content_chars".to_string(),
            serde_json::json!(extraction.content.chars().count()),
        );
        if extraction.truncated {
            patch.insert("truncated".to_string(), serde_json::json!(true));
            patch.insert(
                "original_chars".to_string(),
                serde_json::json!(extraction.original_chars),
            );
        }

        let structures = extraction
            .structures
            .into_iter()
            .map(|s| NewStructure {
                structure_type: s.structure_type.as_str().to_string(),
                content: s.content,
                position: s.position,
                level: s.level,
                metadata: s.metadata,
            })
            .collect();

        Ok(assemble_records(
            document,
            Some(extraction.content),
            patch,
            outcome,
            structures,
            Vec::new(),
        ))
    }

    async fn extract_image(&self, document: &Document) -> Result<ExtractionRecords, ExtractError> {
        let path = self
            .store
            .path_of(&document.storage_name)
            .map_err(|e| ExtractError::Storage(e.to_string()))?;

        let ocr = self.ocr.recognize(&path).await?;
        let outcome = knowledge::extract(&ocr.text, &self.config.knowledge);

        let regions: Vec<serde_json::Value> = ocr
            .regions
            .iter()
            .map(|r| {
                serde_json::json!({
                    "text": r.text,
                    "confidence": r.confidence,
                    "left": r.left,
                    "top": r.top,
                    "width": r.width,
                    "height": r.height,
                })
            })
            .collect();

        let mut patch = serde_json::Map::new();
        patch.insert(
            "ocr_confidence".to_string(),
            serde_json::json!(ocr.confidence),
        );
        patch.insert("ocr_regions".to_string(), serde_json::json!(regions));
        patch.insert(
            "content_chars".to_string(),
            serde_json::json!(ocr.text.chars().count()),
        );

        Ok(assemble_records(
            document,
            Some(ocr.text),
            patch,
            outcome,
            Vec::new(),
            Vec::new(),
        ))
    }

    async fn extract_video(&self, document: &Document) -> Result<ExtractionRecords, ExtractError> {
        let input = self
            .store
            .path_of(&document.storage_name)
            .map_err(|e| ExtractError::Storage(e.to_string()))?;
        let frames_dir = self.store.frames_dir(document.id);

        let sampled = self.sampler.sample(&input, &frames_dir).await?;

        let frames: Vec<NewFrame> = sampled
            .frames
            .iter()
            .map(|f| NewFrame {
                frame_index: f.index,
                storage_name: BlobStore::frame_storage_name(document.id, &f.filename),
                timestamp_secs: f.timestamp_secs,
            })
            .collect();

        let mut patch = serde_json::Map::new();
        patch.insert("frame_count".to_string(), serde_json::json!(frames.len()));
        patch.insert(
            "duration_secs".to_string(),
            serde_json::json!(sampled.duration_secs),
        );
        patch.insert(
            "frame_interval_secs".to_string(),
            serde_json::json!(self.config.video.frame_interval_secs),
        );

        metrics::counter!("quarry_frames_extracted_total").increment(frames.len() as u64);

        // Frames carry the visual content; text arrives only if the frames
        // are OCR'd later.
        Ok(assemble_records(
            document,
            Some(String::new()),
            patch,
            knowledge::KnowledgeOutcome::default(),
            Vec::new(),
            frames,
        ))
    }
}

/// Merge the upload-time metadata with the extraction patch and turn a
/// knowledge outcome into persistable records.
fn assemble_records(
    document: &Document,
    content: Option<String>,
    patch: serde_json::Map<String, serde_json::Value>,
    outcome: knowledge::KnowledgeOutcome,
    structures: Vec<NewStructure>,
    frames: Vec<NewFrame>,
) -> ExtractionRecords {
    let mut metadata = match document.metadata.clone() {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    for (key, value) in patch {
        metadata.insert(key, value);
    }

    let entities: Vec<NewEntity> = outcome
        .entities
        .iter()
        .map(|e| NewEntity {
            id: Uuid::new_v4(),
            text: e.text.clone(),
            label: e.label.to_string(),
            confidence: e.confidence,
            start_offset: e.start as i64,
            end_offset: e.end as i64,
            context: Some(e.context.clone()),
        })
        .collect();

    let relationships = outcome
        .relationships
        .iter()
        .map(|r| NewRelationship {
            source_entity_id: entities[r.source].id,
            target_entity_id: entities[r.target].id,
            relationship_type: r.relationship_type.to_string(),
            confidence: r.confidence,
            context: Some(r.context.clone()),
        })
        .collect();

    let categories = outcome
        .categories
        .into_iter()
        .map(|c| NewCategory {
            category: c.category.to_string(),
            confidence: c.confidence,
            keywords: c.keywords,
        })
        .collect();

    let key_phrases = outcome
        .key_phrases
        .into_iter()
        .map(|p| NewKeyPhrase {
            phrase: p.phrase,
            score: p.score,
        })
        .collect();

    ExtractionRecords {
        content,
        metadata: serde_json::Value::Object(metadata),
        entities,
        categories,
        key_phrases,
        structures,
        relationships,
        frames,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_common::config::KnowledgeConfig;
    use quarry_common::db::models::DocumentStatus;

    fn document(metadata: serde_json::Value) -> Document {
        let now = chrono::Utc::now();
        Document {
            id: Uuid::new_v4(),
            filename: "manual.txt".to_string(),
            file_kind: FileKind::Txt.as_str().to_string(),
            status: DocumentStatus::Processing.as_str().to_string(),
            content: None,
            storage_name: "blob.txt".to_string(),
            byte_size: 64,
            checksum: "deadbeef".to_string(),
            error_message: None,
            metadata,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn test_assemble_links_relationships_to_entity_ids() {
        let text = "The operator starts pump 3 now.";
        let outcome = knowledge::extract(
            text,
            &KnowledgeConfig {
                entity_threshold: 0.5,
                category_threshold: 0.3,
                max_key_phrases: 10,
            },
        );
        assert!(!outcome.relationships.is_empty());

        let records = assemble_records(
            &document(serde_json::json!({})),
            Some(text.to_string()),
            serde_json::Map::new(),
            outcome,
            Vec::new(),
            Vec::new(),
        );

        for relationship in &records.relationships {
            assert!(records
                .entities
                .iter()
                .any(|e| e.id == relationship.source_entity_id));
            assert!(records
                .entities
                .iter()
                .any(|e| e.id == relationship.target_entity_id));
        }
    }

    #[test]
    fn test_assemble_merges_metadata() {
        let mut patch = serde_json::Map::new();
        patch.insert("content_chars".to_string(), serde_json::json!(42));

        let records = assemble_records(
            &document(serde_json::json!({"source": "intranet"})),
            Some("text".to_string()),
            patch,
            knowledge::KnowledgeOutcome::default(),
            Vec::new(),
            Vec::new(),
        );

        assert_eq!(records.metadata["source"], "intranet");
        assert_eq!(records.metadata["content_chars"], 42);
    }

    #[test]
    fn test_assemble_replaces_non_object_metadata() {
        let records = assemble_records(
            &document(serde_json::Value::Null),
            None,
            serde_json::Map::new(),
            knowledge::KnowledgeOutcome::default(),
            Vec::new(),
            Vec::new(),
        );
        assert!(records.metadata.is_object());
    }
}
