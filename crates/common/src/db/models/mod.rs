//! SeaORM entity models
//!
//! Database entities for the Quarry extraction pipeline

mod content_category;
mod document;
mod document_structure;
mod key_phrase;
mod knowledge_entity;
mod knowledge_relationship;
mod video_frame;

pub use document::{
    Entity as DocumentEntity,
    Model as Document,
    ActiveModel as DocumentActiveModel,
    Column as DocumentColumn,
    DocumentStatus,
    FileKind,
};

pub use knowledge_entity::{
    Entity as KnowledgeEntityEntity,
    Model as KnowledgeEntity,
    ActiveModel as KnowledgeEntityActiveModel,
    Column as KnowledgeEntityColumn,
};

pub use content_category::{
    Entity as ContentCategoryEntity,
    Model as ContentCategory,
    ActiveModel as ContentCategoryActiveModel,
    Column as ContentCategoryColumn,
};

pub use key_phrase::{
    Entity as KeyPhraseEntity,
    Model as KeyPhrase,
    ActiveModel as KeyPhraseActiveModel,
    Column as KeyPhraseColumn,
};

pub use document_structure::{
    Entity as DocumentStructureEntity,
    Model as DocumentStructure,
    ActiveModel as DocumentStructureActiveModel,
    Column as DocumentStructureColumn,
};

pub use knowledge_relationship::{
    Entity as KnowledgeRelationshipEntity,
    Model as KnowledgeRelationship,
    ActiveModel as KnowledgeRelationshipActiveModel,
    Column as KnowledgeRelationshipColumn,
};

pub use video_frame::{
    Entity as VideoFrameEntity,
    Model as VideoFrame,
    ActiveModel as VideoFrameActiveModel,
    Column as VideoFrameColumn,
};
