//! Asset entity for SeaORM.

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "assets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Storage basename (uuid + extension for uploads).
    pub filename: String,
    pub original_filename: String,
    /// Asset type: portrait, voice_sample, script, generated_audio, generated_video
    pub asset_type: String,
    /// Status: uploading, processing, ready, error, deleted
    pub status: String,
    pub storage_path: String,
    pub storage_bucket: String,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub file_extension: Option<String>,
    /// Free-form metadata (etag, upload details, producing job)
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<JsonValue>,
    /// Error detail for status=error
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub processing_info: Option<JsonValue>,
    pub user_id: Uuid,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
