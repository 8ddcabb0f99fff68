//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, Statement, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// New entity record produced by an extraction pass.
///
/// Ids are assigned by the extraction stage so relationship records can
/// reference their endpoints before anything is persisted.
#[derive(Debug, Clone)]
pub struct NewEntity {
    pub id: Uuid,
    pub text: String,
    pub label: String,
    pub confidence: f64,
    pub start_offset: i64,
    pub end_offset: i64,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub category: String,
    pub confidence: f64,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewKeyPhrase {
    pub phrase: String,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct NewStructure {
    pub structure_type: String,
    pub content: String,
    pub position: i64,
    pub level: Option<i64>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct NewRelationship {
    pub source_entity_id: Uuid,
    pub target_entity_id: Uuid,
    pub relationship_type: String,
    pub confidence: f64,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewFrame {
    pub frame_index: i64,
    pub storage_name: String,
    pub timestamp_secs: f64,
}

/// Everything one extraction pass produces for a document.
///
/// Written in a single transaction together with the `completed` status so
/// readers can never observe a completed document with partial children.
#[derive(Debug, Clone, Default)]
pub struct ExtractionRecords {
    pub content: Option<String>,
    pub metadata: serde_json::Value,
    pub entities: Vec<NewEntity>,
    pub categories: Vec<NewCategory>,
    pub key_phrases: Vec<NewKeyPhrase>,
    pub structures: Vec<NewStructure>,
    pub relationships: Vec<NewRelationship>,
    pub frames: Vec<NewFrame>,
}

/// Result row from entity search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySearchResult {
    pub entity_id: Uuid,
    pub document_id: Uuid,
    pub filename: String,
    pub text: String,
    pub label: String,
    pub confidence: f64,
    pub context: Option<String>,
}

/// One (label, count) pair in a distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

/// Aggregate extraction statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeStats {
    pub total_documents: u64,
    pub documents_by_status: Vec<LabelCount>,
    pub total_entities: u64,
    pub total_relationships: u64,
    pub total_categories: u64,
    pub total_key_phrases: u64,
    pub entity_types: Vec<LabelCount>,
    pub category_distribution: Vec<LabelCount>,
    pub average_entity_confidence: Option<f64>,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Document Operations
    // ========================================================================

    /// Create a new document in `pending` status
    #[allow(clippy::too_many_arguments)]
    pub async fn create_document(
        &self,
        filename: String,
        kind: FileKind,
        storage_name: String,
        byte_size: i64,
        checksum: String,
        metadata: serde_json::Value,
    ) -> Result<Document> {
        let now = chrono::Utc::now();

        let document = DocumentActiveModel {
            id: Set(Uuid::new_v4()),
            filename: Set(filename),
            file_kind: Set(kind.as_str().to_string()),
            status: Set(DocumentStatus::Pending.as_str().to_string()),
            content: Set(None),
            storage_name: Set(storage_name),
            byte_size: Set(byte_size),
            checksum: Set(checksum),
            error_message: Set(None),
            metadata: Set(metadata),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        document.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find document by ID
    pub async fn find_document(&self, id: Uuid) -> Result<Option<Document>> {
        DocumentEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List documents with optional filters and pagination
    pub async fn list_documents(
        &self,
        kind: Option<FileKind>,
        status: Option<DocumentStatus>,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Document>, u64)> {
        let mut query = DocumentEntity::find();

        if let Some(kind) = kind {
            query = query.filter(DocumentColumn::FileKind.eq(kind.as_str()));
        }
        if let Some(status) = status {
            query = query.filter(DocumentColumn::Status.eq(status.as_str()));
        }

        let paginator = query
            .order_by_desc(DocumentColumn::CreatedAt)
            .paginate(self.read_conn(), limit.max(1));

        let total = paginator.num_items().await?;
        let documents = paginator.fetch_page(offset / limit.max(1)).await?;

        Ok((documents, total))
    }

    /// Claim a pending document for extraction.
    ///
    /// Conditional update enforces both the monotonic lifecycle and the
    /// one-active-pipeline-per-document rule: of two concurrent claimers
    /// exactly one sees `rows_affected == 1`.
    pub async fn claim_document(&self, id: Uuid) -> Result<bool> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = chrono::Utc::now().into();

        let result = DocumentEntity::update_many()
            .col_expr(
                DocumentColumn::Status,
                Expr::value(DocumentStatus::Processing.as_str()),
            )
            .col_expr(DocumentColumn::UpdatedAt, Expr::value(now))
            .filter(DocumentColumn::Id.eq(id))
            .filter(DocumentColumn::Status.eq(DocumentStatus::Pending.as_str()))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Mark a processing document as failed, retaining the reason
    pub async fn fail_document(&self, id: Uuid, message: &str) -> Result<bool> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = chrono::Utc::now().into();

        let result = DocumentEntity::update_many()
            .col_expr(
                DocumentColumn::Status,
                Expr::value(DocumentStatus::Failed.as_str()),
            )
            .col_expr(DocumentColumn::ErrorMessage, Expr::value(message))
            .col_expr(DocumentColumn::UpdatedAt, Expr::value(now))
            .filter(DocumentColumn::Id.eq(id))
            .filter(DocumentColumn::Status.eq(DocumentStatus::Processing.as_str()))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Persist the results of an extraction pass and complete the document.
    ///
    /// Runs in one transaction: the guarded status flip, removal of any
    /// children from an earlier pass, and the full child batch. Returns
    /// false (and persists nothing) if the document is not `processing`.
    pub async fn complete_extraction(&self, id: Uuid, records: ExtractionRecords) -> Result<bool> {
        let txn = self.write_conn().begin().await?;
        let now: sea_orm::prelude::DateTimeWithTimeZone = chrono::Utc::now().into();

        let updated = DocumentEntity::update_many()
            .col_expr(
                DocumentColumn::Status,
                Expr::value(DocumentStatus::Completed.as_str()),
            )
            .col_expr(DocumentColumn::Content, Expr::value(records.content.clone()))
            .col_expr(DocumentColumn::Metadata, Expr::value(records.metadata.clone()))
            .col_expr(DocumentColumn::ErrorMessage, Expr::value(Option::<String>::None))
            .col_expr(DocumentColumn::UpdatedAt, Expr::value(now))
            .filter(DocumentColumn::Id.eq(id))
            .filter(DocumentColumn::Status.eq(DocumentStatus::Processing.as_str()))
            .exec(&txn)
            .await?;

        if updated.rows_affected != 1 {
            txn.rollback().await?;
            return Ok(false);
        }

        // Replace children from any earlier pass; relationships cascade from
        // entities but are deleted explicitly to keep the pass self-contained.
        KnowledgeRelationshipEntity::delete_many()
            .filter(KnowledgeRelationshipColumn::DocumentId.eq(id))
            .exec(&txn)
            .await?;
        KnowledgeEntityEntity::delete_many()
            .filter(KnowledgeEntityColumn::DocumentId.eq(id))
            .exec(&txn)
            .await?;
        ContentCategoryEntity::delete_many()
            .filter(ContentCategoryColumn::DocumentId.eq(id))
            .exec(&txn)
            .await?;
        KeyPhraseEntity::delete_many()
            .filter(KeyPhraseColumn::DocumentId.eq(id))
            .exec(&txn)
            .await?;
        DocumentStructureEntity::delete_many()
            .filter(DocumentStructureColumn::DocumentId.eq(id))
            .exec(&txn)
            .await?;
        VideoFrameEntity::delete_many()
            .filter(VideoFrameColumn::DocumentId.eq(id))
            .exec(&txn)
            .await?;

        if !records.entities.is_empty() {
            let models = records.entities.iter().map(|e| KnowledgeEntityActiveModel {
                id: Set(e.id),
                document_id: Set(id),
                text: Set(e.text.clone()),
                label: Set(e.label.clone()),
                confidence: Set(e.confidence),
                start_offset: Set(e.start_offset),
                end_offset: Set(e.end_offset),
                context: Set(e.context.clone()),
                created_at: Set(now),
            });
            KnowledgeEntityEntity::insert_many(models).exec(&txn).await?;
        }

        if !records.relationships.is_empty() {
            let models = records
                .relationships
                .iter()
                .map(|r| KnowledgeRelationshipActiveModel {
                    id: Set(Uuid::new_v4()),
                    document_id: Set(id),
                    source_entity_id: Set(r.source_entity_id),
                    target_entity_id: Set(r.target_entity_id),
                    relationship_type: Set(r.relationship_type.clone()),
                    confidence: Set(r.confidence),
                    context: Set(r.context.clone()),
                    created_at: Set(now),
                });
            KnowledgeRelationshipEntity::insert_many(models)
                .exec(&txn)
                .await?;
        }

        if !records.categories.is_empty() {
            let models = records.categories.iter().map(|c| ContentCategoryActiveModel {
                id: Set(Uuid::new_v4()),
                document_id: Set(id),
                category: Set(c.category.clone()),
                confidence: Set(c.confidence),
                keywords: Set(serde_json::json!(c.keywords)),
                created_at: Set(now),
            });
            ContentCategoryEntity::insert_many(models).exec(&txn).await?;
        }

        if !records.key_phrases.is_empty() {
            let models = records.key_phrases.iter().map(|p| KeyPhraseActiveModel {
                id: Set(Uuid::new_v4()),
                document_id: Set(id),
                phrase: Set(p.phrase.clone()),
                score: Set(p.score),
                created_at: Set(now),
            });
            KeyPhraseEntity::insert_many(models).exec(&txn).await?;
        }

        if !records.structures.is_empty() {
            let models = records.structures.iter().map(|s| DocumentStructureActiveModel {
                id: Set(Uuid::new_v4()),
                document_id: Set(id),
                structure_type: Set(s.structure_type.clone()),
                content: Set(s.content.clone()),
                position: Set(s.position),
                level: Set(s.level),
                metadata: Set(s.metadata.clone()),
                created_at: Set(now),
            });
            DocumentStructureEntity::insert_many(models).exec(&txn).await?;
        }

        if !records.frames.is_empty() {
            let models = records.frames.iter().map(|f| VideoFrameActiveModel {
                id: Set(Uuid::new_v4()),
                document_id: Set(id),
                frame_index: Set(f.frame_index),
                storage_name: Set(f.storage_name.clone()),
                timestamp_secs: Set(f.timestamp_secs),
                created_at: Set(now),
            });
            VideoFrameEntity::insert_many(models).exec(&txn).await?;
        }

        txn.commit().await?;
        Ok(true)
    }

    /// Merge a metadata patch into a document (PATCH semantics)
    pub async fn update_metadata(
        &self,
        id: Uuid,
        patch: serde_json::Value,
    ) -> Result<Option<Document>> {
        let Some(document) = self.find_document(id).await? else {
            return Ok(None);
        };

        let mut merged = document.metadata.clone();
        if let (Some(base), Some(extra)) = (merged.as_object_mut(), patch.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        } else {
            merged = patch;
        }

        let mut active: DocumentActiveModel = document.into();
        active.metadata = Set(merged);
        active.updated_at = Set(chrono::Utc::now().into());

        let updated = active.update(self.write_conn()).await?;
        Ok(Some(updated))
    }

    /// Delete a document; children cascade at the database level
    pub async fn delete_document(&self, id: Uuid) -> Result<bool> {
        let result = DocumentEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Child Record Queries
    // ========================================================================

    /// Get entities for a document, highest confidence first
    pub async fn entities_by_document(&self, document_id: Uuid) -> Result<Vec<KnowledgeEntity>> {
        KnowledgeEntityEntity::find()
            .filter(KnowledgeEntityColumn::DocumentId.eq(document_id))
            .order_by_desc(KnowledgeEntityColumn::Confidence)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Get categories for a document, highest confidence first
    pub async fn categories_by_document(&self, document_id: Uuid) -> Result<Vec<ContentCategory>> {
        ContentCategoryEntity::find()
            .filter(ContentCategoryColumn::DocumentId.eq(document_id))
            .order_by_desc(ContentCategoryColumn::Confidence)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Get key phrases for a document, highest score first
    pub async fn key_phrases_by_document(&self, document_id: Uuid) -> Result<Vec<KeyPhrase>> {
        KeyPhraseEntity::find()
            .filter(KeyPhraseColumn::DocumentId.eq(document_id))
            .order_by_desc(KeyPhraseColumn::Score)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Get structural units for a document in document order
    pub async fn structures_by_document(&self, document_id: Uuid) -> Result<Vec<DocumentStructure>> {
        DocumentStructureEntity::find()
            .filter(DocumentStructureColumn::DocumentId.eq(document_id))
            .order_by_asc(DocumentStructureColumn::Position)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Get all frames for a video document, in index order
    pub async fn frames_by_document(&self, document_id: Uuid) -> Result<Vec<VideoFrame>> {
        VideoFrameEntity::find()
            .filter(VideoFrameColumn::DocumentId.eq(document_id))
            .order_by_asc(VideoFrameColumn::FrameIndex)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Get one frame by document and index
    pub async fn find_frame(&self, document_id: Uuid, index: i64) -> Result<Option<VideoFrame>> {
        VideoFrameEntity::find()
            .filter(VideoFrameColumn::DocumentId.eq(document_id))
            .filter(VideoFrameColumn::FrameIndex.eq(index))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Knowledge Search & Stats
    // ========================================================================

    /// Search entities across documents by text match
    pub async fn search_entities(
        &self,
        query: &str,
        labels: Option<Vec<String>>,
        min_confidence: f64,
        limit: u64,
    ) -> Result<Vec<EntitySearchResult>> {
        let mut values: Vec<sea_orm::Value> = vec![
            format!("%{}%", query).into(),
            min_confidence.into(),
            (limit as i64).into(),
        ];

        let label_filter = match labels.filter(|l| !l.is_empty()) {
            Some(labels) => {
                let placeholders: Vec<String> = labels
                    .iter()
                    .enumerate()
                    .map(|(i, _)| format!("${}", values.len() + i + 1))
                    .collect();
                for label in labels {
                    values.push(label.into());
                }
                format!("AND e.label IN ({})", placeholders.join(", "))
            }
            None => String::new(),
        };

        let sql = format!(
            r#"
            SELECT
                e.id as entity_id,
                e.document_id,
                d.filename,
                e.text,
                e.label,
                e.confidence,
                e.context
            FROM knowledge_entities e
            JOIN documents d ON e.document_id = d.id
            WHERE e.text ILIKE $1
              AND e.confidence >= $2
            {}
            ORDER BY e.confidence DESC
            LIMIT $3
            "#,
            label_filter
        );

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, &sql, values);

        let results = self
            .read_conn()
            .query_all(stmt)
            .await?
            .into_iter()
            .filter_map(|row| {
                Some(EntitySearchResult {
                    entity_id: row.try_get_by_index::<Uuid>(0).ok()?,
                    document_id: row.try_get_by_index::<Uuid>(1).ok()?,
                    filename: row.try_get_by_index::<String>(2).ok()?,
                    text: row.try_get_by_index::<String>(3).ok()?,
                    label: row.try_get_by_index::<String>(4).ok()?,
                    confidence: row.try_get_by_index::<f64>(5).ok()?,
                    context: row.try_get_by_index::<Option<String>>(6).ok()?,
                })
            })
            .collect();

        Ok(results)
    }

    /// Aggregate extraction statistics across the whole store
    pub async fn knowledge_stats(&self) -> Result<KnowledgeStats> {
        let total_documents = DocumentEntity::find().count(self.read_conn()).await?;
        let total_entities = KnowledgeEntityEntity::find().count(self.read_conn()).await?;
        let total_relationships = KnowledgeRelationshipEntity::find()
            .count(self.read_conn())
            .await?;
        let total_categories = ContentCategoryEntity::find().count(self.read_conn()).await?;
        let total_key_phrases = KeyPhraseEntity::find().count(self.read_conn()).await?;

        let documents_by_status = self
            .label_counts("SELECT status, COUNT(*) FROM documents GROUP BY status ORDER BY status")
            .await?;
        let entity_types = self
            .label_counts(
                "SELECT label, COUNT(*) FROM knowledge_entities GROUP BY label ORDER BY COUNT(*) DESC",
            )
            .await?;
        let category_distribution = self
            .label_counts(
                "SELECT category, COUNT(*) FROM content_categories GROUP BY category ORDER BY COUNT(*) DESC",
            )
            .await?;

        let avg_stmt = Statement::from_string(
            DbBackend::Postgres,
            "SELECT AVG(confidence) FROM knowledge_entities".to_string(),
        );
        let average_entity_confidence = self
            .read_conn()
            .query_one(avg_stmt)
            .await?
            .and_then(|row| row.try_get_by_index::<Option<f64>>(0).ok())
            .flatten();

        Ok(KnowledgeStats {
            total_documents,
            documents_by_status,
            total_entities,
            total_relationships,
            total_categories,
            total_key_phrases,
            entity_types,
            category_distribution,
            average_entity_confidence,
        })
    }

    /// Run a `SELECT label, COUNT(*)` style statement into LabelCount pairs
    async fn label_counts(&self, sql: &str) -> Result<Vec<LabelCount>> {
        let stmt = Statement::from_string(DbBackend::Postgres, sql.to_string());

        let rows = self.read_conn().query_all(stmt).await?;
        let counts = rows
            .into_iter()
            .filter_map(|row| {
                Some(LabelCount {
                    label: row.try_get_by_index::<String>(0).ok()?,
                    count: row.try_get_by_index::<i64>(1).ok()?,
                })
            })
            .collect();

        Ok(counts)
    }
}
