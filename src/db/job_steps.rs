//! Database queries for job steps.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::entity::job_step::{self, ActiveModel, Entity as JobStep};
use crate::error::{AppError, AppResult};
use crate::models::StepStatus;

use super::DbPool;

/// Column values for a newly created job step.
pub struct NewJobStep {
    pub id: Uuid,
    pub job_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub step_order: i32,
    pub estimated_duration: Option<i32>,
    pub input_data: Option<JsonValue>,
}

impl DbPool {
    /// Insert a new step in pending state.
    pub async fn insert_job_step(&self, new: NewJobStep) -> AppResult<job_step::Model> {
        let now = Utc::now();

        let model = ActiveModel {
            id: Set(new.id),
            job_id: Set(new.job_id),
            name: Set(new.name),
            description: Set(new.description),
            step_order: Set(new.step_order),
            status: Set(StepStatus::Pending.as_str().to_string()),
            progress_percentage: Set(0),
            estimated_duration: Set(new.estimated_duration),
            input_data: Set(new.input_data),
            output_data: Set(None),
            error_info: Set(None),
            started_at: Set(None),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert job step: {}", e)))?;

        Ok(result)
    }

    /// List all steps of a job in execution order.
    pub async fn list_job_steps(&self, job_id: Uuid) -> AppResult<Vec<job_step::Model>> {
        let result = JobStep::find()
            .filter(job_step::Column::JobId.eq(job_id))
            .order_by_asc(job_step::Column::StepOrder)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list job steps: {}", e)))?;

        Ok(result)
    }

    /// Next free step_order value for a job.
    pub async fn next_step_order(&self, job_id: Uuid) -> AppResult<i32> {
        let last = JobStep::find()
            .filter(job_step::Column::JobId.eq(job_id))
            .order_by_desc(job_step::Column::StepOrder)
            .limit(1)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get last step order: {}", e)))?;

        Ok(last.map(|s| s.step_order + 1).unwrap_or(0))
    }

    /// Move a step into the running state.
    pub async fn start_job_step(&self, id: Uuid) -> AppResult<()> {
        let step = self
            .get_step(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job step {} not found", id)))?;

        let mut active: ActiveModel = step.into();
        active.status = Set(StepStatus::Running.as_str().to_string());
        active.started_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());

        active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to start job step: {}", e)))?;

        Ok(())
    }

    /// Finish a step successfully with optional output.
    pub async fn complete_job_step(&self, id: Uuid, output: Option<JsonValue>) -> AppResult<()> {
        let step = self
            .get_step(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job step {} not found", id)))?;

        let mut active: ActiveModel = step.into();
        active.status = Set(StepStatus::Completed.as_str().to_string());
        active.progress_percentage = Set(100);
        active.output_data = Set(output);
        active.completed_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());

        active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to complete job step: {}", e)))?;

        Ok(())
    }

    /// Finish a step with an error.
    pub async fn fail_job_step(&self, id: Uuid, message: &str) -> AppResult<()> {
        let step = self
            .get_step(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job step {} not found", id)))?;

        let mut active: ActiveModel = step.into();
        active.status = Set(StepStatus::Failed.as_str().to_string());
        active.error_info = Set(Some(json!({ "message": message })));
        active.completed_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());

        active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to fail job step: {}", e)))?;

        Ok(())
    }

    /// Mark a step skipped, used when a checkpoint already covers its work.
    pub async fn skip_job_step(&self, id: Uuid) -> AppResult<()> {
        let step = self
            .get_step(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job step {} not found", id)))?;

        let mut active: ActiveModel = step.into();
        active.status = Set(StepStatus::Skipped.as_str().to_string());
        active.progress_percentage = Set(100);
        active.completed_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());

        active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to skip job step: {}", e)))?;

        Ok(())
    }

    /// Fail every still-running step of a job, used on cancellation.
    pub async fn fail_running_steps(&self, job_id: Uuid, message: &str) -> AppResult<u64> {
        let result = JobStep::update_many()
            .col_expr(
                job_step::Column::Status,
                Expr::value(StepStatus::Failed.as_str()),
            )
            .col_expr(
                job_step::Column::ErrorInfo,
                Expr::value(json!({ "message": message })),
            )
            .col_expr(job_step::Column::CompletedAt, Expr::value(Utc::now()))
            .filter(job_step::Column::JobId.eq(job_id))
            .filter(job_step::Column::Status.eq(StepStatus::Running.as_str()))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to fail running steps: {}", e)))?;

        Ok(result.rows_affected)
    }

    async fn get_step(&self, id: Uuid) -> AppResult<Option<job_step::Model>> {
        let result = JobStep::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get job step: {}", e)))?;

        Ok(result)
    }
}
