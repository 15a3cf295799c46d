//! Database queries for generation jobs.
//!
//! All mutations performed by running pipeline tasks are guarded on
//! status = 'processing' so a concurrent cancel wins the race. The claim
//! itself is a conditional update from 'pending'.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::entity::job::{self, ActiveModel, Entity as Job};
use crate::error::{AppError, AppResult};
use crate::models::{
    JobPriority, JobStatus, JobType, PaginationParams, UpdateJobRequest,
};

use super::DbPool;

/// Column values for a newly created job record.
pub struct NewJob {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub job_type: JobType,
    pub priority: JobPriority,
    pub parameters: JsonValue,
    pub estimated_duration: Option<i32>,
}

impl DbPool {
    /// Insert a new job in pending state.
    pub async fn insert_job(&self, new: NewJob) -> AppResult<job::Model> {
        let now = Utc::now();

        let model = ActiveModel {
            id: Set(new.id),
            user_id: Set(new.user_id),
            title: Set(new.title),
            description: Set(new.description),
            job_type: Set(new.job_type.as_str().to_string()),
            status: Set(JobStatus::Pending.as_str().to_string()),
            priority: Set(new.priority.as_str().to_string()),
            progress_percentage: Set(0),
            progress_message: Set(None),
            parameters: Set(new.parameters),
            results: Set(None),
            error_info: Set(None),
            service_metadata: Set(None),
            checkpoint: Set(None),
            task_id: Set(None),
            estimated_duration: Set(new.estimated_duration),
            created_at: Set(now),
            started_at: Set(None),
            completed_at: Set(None),
            updated_at: Set(now),
        };

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert job: {}", e)))?;

        Ok(result)
    }

    /// Get a job by ID regardless of owner.
    pub async fn get_job_by_id(&self, id: Uuid) -> AppResult<Option<job::Model>> {
        let result = Job::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get job: {}", e)))?;

        Ok(result)
    }

    /// Get a job scoped to its owner.
    pub async fn get_job_for_user(&self, id: Uuid, user_id: Uuid) -> AppResult<Option<job::Model>> {
        let result = Job::find_by_id(id)
            .filter(job::Column::UserId.eq(user_id))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get job: {}", e)))?;

        Ok(result)
    }

    /// Look up a job by the task executing it.
    pub async fn get_job_by_task_id(&self, task_id: Uuid) -> AppResult<Option<job::Model>> {
        let result = Job::find()
            .filter(job::Column::TaskId.eq(task_id))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get job by task: {}", e)))?;

        Ok(result)
    }

    /// List a user's jobs with optional filters, newest first.
    pub async fn list_jobs(
        &self,
        user_id: Uuid,
        job_type: Option<JobType>,
        status: Option<JobStatus>,
        priority: Option<JobPriority>,
        pagination: &PaginationParams,
    ) -> AppResult<(Vec<job::Model>, u64)> {
        let mut select = Job::find().filter(job::Column::UserId.eq(user_id));

        if let Some(job_type) = job_type {
            select = select.filter(job::Column::JobType.eq(job_type.as_str()));
        }
        if let Some(status) = status {
            select = select.filter(job::Column::Status.eq(status.as_str()));
        }
        if let Some(priority) = priority {
            select = select.filter(job::Column::Priority.eq(priority.as_str()));
        }

        let total = select
            .clone()
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count jobs: {}", e)))?;

        let jobs = select
            .order_by_desc(job::Column::CreatedAt)
            .offset(pagination.offset())
            .limit(pagination.clamped_per_page())
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list jobs: {}", e)))?;

        Ok((jobs, total))
    }

    /// Apply user-editable field changes to a job.
    pub async fn update_job_fields(
        &self,
        id: Uuid,
        changes: &UpdateJobRequest,
    ) -> AppResult<job::Model> {
        let existing = self
            .get_job_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;

        let mut active: ActiveModel = existing.into();
        if let Some(ref title) = changes.title {
            active.title = Set(title.clone());
        }
        if let Some(ref description) = changes.description {
            active.description = Set(Some(description.clone()));
        }
        if let Some(priority) = changes.priority {
            active.priority = Set(priority.as_str().to_string());
        }
        if let Some(ref parameters) = changes.parameters {
            active.parameters = Set(parameters.clone());
        }
        active.updated_at = Set(Utc::now());

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update job: {}", e)))?;

        Ok(result)
    }

    /// Atomically claim a pending job for a task.
    ///
    /// Returns false when the job was already claimed, cancelled or missing.
    pub async fn claim_job(&self, id: Uuid, task_id: Uuid) -> AppResult<bool> {
        let result = Job::update_many()
            .col_expr(
                job::Column::Status,
                Expr::value(JobStatus::Processing.as_str()),
            )
            .col_expr(job::Column::StartedAt, Expr::value(Utc::now()))
            .col_expr(job::Column::TaskId, Expr::value(task_id))
            .filter(job::Column::Id.eq(id))
            .filter(job::Column::Status.eq(JobStatus::Pending.as_str()))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to claim job: {}", e)))?;

        Ok(result.rows_affected == 1)
    }

    /// Set progress on a job with no status guard.
    pub async fn update_job_progress(
        &self,
        id: Uuid,
        progress_percentage: i32,
        message: Option<&str>,
    ) -> AppResult<job::Model> {
        let existing = self
            .get_job_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;

        let mut active: ActiveModel = existing.into();
        active.progress_percentage = Set(progress_percentage);
        if let Some(message) = message {
            active.progress_message = Set(Some(message.to_string()));
        }
        active.updated_at = Set(Utc::now());

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update job progress: {}", e)))?;

        Ok(result)
    }

    /// Set progress only while the job is still processing.
    ///
    /// Returns false when the job has left the processing state, which tells
    /// the running task to stop.
    pub async fn update_job_progress_if_processing(
        &self,
        id: Uuid,
        progress_percentage: i32,
        message: Option<&str>,
    ) -> AppResult<bool> {
        let mut update = Job::update_many()
            .col_expr(
                job::Column::ProgressPercentage,
                Expr::value(progress_percentage),
            )
            .filter(job::Column::Id.eq(id))
            .filter(job::Column::Status.eq(JobStatus::Processing.as_str()));

        if let Some(message) = message {
            update = update.col_expr(job::Column::ProgressMessage, Expr::value(message));
        }

        let result = update
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update job progress: {}", e)))?;

        Ok(result.rows_affected == 1)
    }

    /// Persist the pipeline checkpoint while the job is still processing.
    pub async fn set_job_checkpoint(&self, id: Uuid, checkpoint: JsonValue) -> AppResult<bool> {
        let result = Job::update_many()
            .col_expr(job::Column::Checkpoint, Expr::value(checkpoint))
            .filter(job::Column::Id.eq(id))
            .filter(job::Column::Status.eq(JobStatus::Processing.as_str()))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to set job checkpoint: {}", e)))?;

        Ok(result.rows_affected == 1)
    }

    /// Record which hosted models served the job.
    pub async fn set_job_service_metadata(&self, id: Uuid, metadata: JsonValue) -> AppResult<bool> {
        let result = Job::update_many()
            .col_expr(job::Column::ServiceMetadata, Expr::value(metadata))
            .filter(job::Column::Id.eq(id))
            .filter(job::Column::Status.eq(JobStatus::Processing.as_str()))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to set service metadata: {}", e)))?;

        Ok(result.rows_affected == 1)
    }

    /// Finish a processing job successfully.
    pub async fn complete_job(&self, id: Uuid, results: JsonValue) -> AppResult<bool> {
        let result = Job::update_many()
            .col_expr(
                job::Column::Status,
                Expr::value(JobStatus::Completed.as_str()),
            )
            .col_expr(job::Column::ProgressPercentage, Expr::value(100))
            .col_expr(job::Column::Results, Expr::value(results))
            .col_expr(job::Column::CompletedAt, Expr::value(Utc::now()))
            .filter(job::Column::Id.eq(id))
            .filter(job::Column::Status.eq(JobStatus::Processing.as_str()))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to complete job: {}", e)))?;

        Ok(result.rows_affected == 1)
    }

    /// Finish a processing job with an error.
    pub async fn fail_job(&self, id: Uuid, error_info: JsonValue) -> AppResult<bool> {
        let result = Job::update_many()
            .col_expr(job::Column::Status, Expr::value(JobStatus::Failed.as_str()))
            .col_expr(job::Column::ErrorInfo, Expr::value(error_info))
            .col_expr(job::Column::CompletedAt, Expr::value(Utc::now()))
            .filter(job::Column::Id.eq(id))
            .filter(job::Column::Status.eq(JobStatus::Processing.as_str()))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to fail job: {}", e)))?;

        Ok(result.rows_affected == 1)
    }

    /// Cancel a job that has not yet finished.
    ///
    /// Returns false when the job was already terminal.
    pub async fn cancel_job(&self, id: Uuid) -> AppResult<bool> {
        let result = Job::update_many()
            .col_expr(
                job::Column::Status,
                Expr::value(JobStatus::Cancelled.as_str()),
            )
            .col_expr(job::Column::CompletedAt, Expr::value(Utc::now()))
            .filter(job::Column::Id.eq(id))
            .filter(
                job::Column::Status.is_in([
                    JobStatus::Pending.as_str(),
                    JobStatus::Processing.as_str(),
                ]),
            )
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to cancel job: {}", e)))?;

        Ok(result.rows_affected == 1)
    }

    /// Remove a job and its steps.
    pub async fn delete_job(&self, id: Uuid) -> AppResult<()> {
        Job::delete_by_id(id)
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete job: {}", e)))?;

        Ok(())
    }

    /// Count jobs waiting and jobs currently running.
    pub async fn count_active_jobs(&self) -> AppResult<(u64, u64)> {
        let pending = Job::find()
            .filter(job::Column::Status.eq(JobStatus::Pending.as_str()))
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count pending jobs: {}", e)))?;

        let processing = Job::find()
            .filter(job::Column::Status.eq(JobStatus::Processing.as_str()))
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count processing jobs: {}", e)))?;

        Ok((pending, processing))
    }
}
