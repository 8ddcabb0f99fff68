//! Knowledge relationship: a directed relation between two entities of the
//! same document. Cross-document relations are not supported.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "knowledge_relationships")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub document_id: Uuid,

    pub source_entity_id: Uuid,

    pub target_entity_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub relationship_type: String,

    pub confidence: f64,

    #[sea_orm(column_type = "Text", nullable)]
    pub context: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::document::Entity",
        from = "Column::DocumentId",
        to = "super::document::Column::Id"
    )]
    Document,

    #[sea_orm(
        belongs_to = "super::knowledge_entity::Entity",
        from = "Column::SourceEntityId",
        to = "super::knowledge_entity::Column::Id"
    )]
    SourceEntity,

    #[sea_orm(
        belongs_to = "super::knowledge_entity::Entity",
        from = "Column::TargetEntityId",
        to = "super::knowledge_entity::Column::Id"
    )]
    TargetEntity,
}

impl Related<super::document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Document.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
