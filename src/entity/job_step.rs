//! Job step entity for SeaORM.

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "job_steps")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub job_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub step_order: i32,
    /// Status: pending, running, completed, failed, skipped
    pub status: String,
    pub progress_percentage: i32,
    /// Estimated duration in seconds
    pub estimated_duration: Option<i32>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub input_data: Option<JsonValue>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub output_data: Option<JsonValue>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub error_info: Option<JsonValue>,
    pub started_at: Option<DateTimeUtc>,
    pub completed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::job::Entity",
        from = "Column::JobId",
        to = "super::job::Column::Id",
        on_delete = "Cascade"
    )]
    Job,
}

impl Related<super::job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Job.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
