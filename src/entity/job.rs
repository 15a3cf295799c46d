//! Job entity for SeaORM.

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Job type: script_generation, text_to_speech, video_generation, full_pipeline, voice_clone
    pub job_type: String,
    /// Status: pending, processing, completed, failed, cancelled
    pub status: String,
    /// Priority: low, normal, high, urgent
    pub priority: String,
    pub progress_percentage: i32,
    pub progress_message: Option<String>,
    /// Typed per-job-type parameters (shape selected by job_type)
    #[sea_orm(column_type = "JsonBinary")]
    pub parameters: JsonValue,
    /// Typed per-job-type results, set on completion
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub results: Option<JsonValue>,
    /// {message, stage, task_id} on failure
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub error_info: Option<JsonValue>,
    /// {service: {model_name, model_type, ...}} captured from clients
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub service_metadata: Option<JsonValue>,
    /// Committed pipeline stage markers (full pipeline saga)
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub checkpoint: Option<JsonValue>,
    /// Id of the spawned task execution that claimed this job
    pub task_id: Option<Uuid>,
    pub user_id: Uuid,
    /// Estimated duration in seconds
    pub estimated_duration: Option<i32>,
    pub created_at: DateTimeUtc,
    pub started_at: Option<DateTimeUtc>,
    pub completed_at: Option<DateTimeUtc>,
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
    #[sea_orm(has_many = "super::job_step::Entity")]
    Steps,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::job_step::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Steps.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
