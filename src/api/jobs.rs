//! Job CRUD and lifecycle endpoints.
//!
//! Creation validates the typed parameter payload and ownership of every
//! referenced asset before the job row exists, then spawns the background
//! task. All reads and writes are scoped to the authenticated user; jobs
//! belonging to someone else surface as 404.

use actix_web::{delete, get, post, put, web, HttpResponse};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::jobs::NewJob;
use crate::db::job_steps::NewJobStep;
use crate::db::DbPool;
use crate::entity::job;
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateJobRequest, CreateStepRequest, JobEvent, JobEventMessage, JobListResponse, JobParams,
    JobPollResponse, JobPriority, JobResponse, JobStatus, JobStepResponse, JobType, ListJobsQuery,
    Pagination, PaginationParams, ProgressUpdateRequest, UpdateJobRequest,
};
use crate::services::PipelineContext;

/// Response for job deletion.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeleteJobResponse {
    pub message: String,
    pub job_id: Uuid,
}

/// Response wrapper for step listings.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StepListResponse {
    pub steps: Vec<JobStepResponse>,
}

/// Configure job routes under /api/jobs.
///
/// The /ws resource must register before the /{id} matchers so the literal
/// segment wins.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/jobs")
            .service(
                web::resource("/ws")
                    .route(web::get().to(super::websocket::websocket_handler)),
            )
            .service(list_jobs)
            .service(create_job)
            .service(cancel_job)
            .service(update_progress)
            .service(list_steps)
            .service(create_step)
            .service(poll_job)
            .service(get_job)
            .service(update_job)
            .service(delete_job),
    );
}

pub(crate) fn validate_title(title: &str) -> AppResult<()> {
    let len = title.trim().chars().count();
    if len == 0 {
        return Err(AppError::InvalidInput("Title cannot be empty".to_string()));
    }
    if len > 200 {
        return Err(AppError::InvalidInput(
            "Title must be at most 200 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_description(description: &str) -> AppResult<()> {
    if description.chars().count() > 1000 {
        return Err(AppError::InvalidInput(
            "Description must be at most 1000 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_estimated_duration(duration: i32) -> AppResult<()> {
    if duration < 1 {
        return Err(AppError::InvalidInput(
            "Estimated duration must be at least 1 second".to_string(),
        ));
    }
    Ok(())
}

/// Confirm every referenced asset exists and belongs to the user.
///
/// Runs before the job row is inserted so a bad reference never leaves a
/// half-created job behind.
pub(crate) async fn ensure_assets_owned(
    pool: &DbPool,
    user_id: Uuid,
    asset_ids: &[Uuid],
) -> AppResult<()> {
    let mut wanted = asset_ids.to_vec();
    wanted.sort_unstable();
    wanted.dedup();
    if wanted.is_empty() {
        return Ok(());
    }

    let found = pool.get_assets_for_user_by_ids(&wanted, user_id).await?;
    for id in &wanted {
        if !found.iter().any(|a| a.id == *id) {
            return Err(AppError::NotFound(format!("Asset {}", id)));
        }
    }
    Ok(())
}

/// List the authenticated user's jobs, newest first.
#[utoipa::path(
    get,
    path = "/api/jobs",
    tag = "Jobs",
    params(
        ("job_type" = Option<String>, Query, description = "Filter by job type"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("priority" = Option<String>, Query, description = "Filter by priority"),
        ("page" = Option<u64>, Query, description = "Page number (1-based)"),
        ("per_page" = Option<u64>, Query, description = "Items per page (max 100)")
    ),
    responses(
        (status = 200, description = "Jobs for the current user", body = JobListResponse),
        (status = 400, description = "Invalid filter value"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
#[get("")]
pub async fn list_jobs(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    query: web::Query<ListJobsQuery>,
) -> AppResult<HttpResponse> {
    let pagination = PaginationParams::new(query.page, query.per_page);
    let (jobs, total) = pool
        .list_jobs(
            auth.user_id,
            query.job_type,
            query.status,
            query.priority,
            &pagination,
        )
        .await?;

    let response = JobListResponse {
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
        pagination: Pagination::new(pagination.page(), pagination.clamped_per_page(), total),
    };
    Ok(HttpResponse::Ok().json(response))
}

/// Create a job and spawn its background task.
#[utoipa::path(
    post,
    path = "/api/jobs",
    tag = "Jobs",
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Job created and task spawned", body = JobResponse),
        (status = 400, description = "Validation failed or parameters do not match job type"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Referenced asset not found")
    ),
    security(("bearer_auth" = []))
)]
#[post("")]
pub async fn create_job(
    pool: web::Data<DbPool>,
    ctx: web::Data<PipelineContext>,
    auth: AuthUser,
    body: web::Json<CreateJobRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();

    validate_title(&req.title)?;
    if let Some(description) = &req.description {
        validate_description(description)?;
    }
    if let Some(duration) = req.estimated_duration {
        validate_estimated_duration(duration)?;
    }

    let params = JobParams::parse(req.job_type, &req.parameters)
        .map_err(AppError::InvalidInput)?;
    let mut referenced = params.input_asset_ids();
    if let Some(extra) = &req.asset_ids {
        referenced.extend(extra.iter().copied());
    }
    ensure_assets_owned(&pool, auth.user_id, &referenced).await?;

    let job = pool
        .insert_job(NewJob {
            id: Uuid::now_v7(),
            user_id: auth.user_id,
            title: req.title.trim().to_string(),
            description: req.description,
            job_type: req.job_type,
            priority: req.priority.unwrap_or(JobPriority::Normal),
            parameters: req.parameters,
            estimated_duration: req.estimated_duration,
        })
        .await?;

    info!(
        job_id = %job.id,
        job_type = %req.job_type,
        user_id = %auth.user_id,
        "Job created"
    );
    ctx.broadcaster.send(JobEventMessage::new(JobEvent::created(
        job.id,
        auth.user_id,
        req.job_type,
        job.title.clone(),
    )));

    let task_id = crate::services::pipeline::spawn_job(&ctx, job.clone());

    // The task writes task_id to the row when it claims the job; the create
    // response carries it immediately so callers can poll /api/worker.
    let mut response = JobResponse::from(job);
    response.task_id = Some(task_id);
    Ok(HttpResponse::Created().json(response))
}

/// Fetch one job with its steps.
#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    tag = "Jobs",
    params(("id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job detail", body = JobResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Job not found")
    ),
    security(("bearer_auth" = []))
)]
#[get("/{id}")]
pub async fn get_job(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let job_id = path.into_inner();
    let job = fetch_owned_job(&pool, job_id, auth.user_id).await?;
    let steps = pool.list_job_steps(job_id).await?;

    let mut response = JobResponse::from(job);
    response.steps = Some(steps.into_iter().map(JobStepResponse::from).collect());
    Ok(HttpResponse::Ok().json(response))
}

/// Update title, description, priority, or parameters of a non-terminal job.
#[utoipa::path(
    put,
    path = "/api/jobs/{id}",
    tag = "Jobs",
    params(("id" = Uuid, Path, description = "Job id")),
    request_body = UpdateJobRequest,
    responses(
        (status = 200, description = "Updated job", body = JobResponse),
        (status = 400, description = "Job already finished or validation failed"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Job not found")
    ),
    security(("bearer_auth" = []))
)]
#[put("/{id}")]
pub async fn update_job(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdateJobRequest>,
) -> AppResult<HttpResponse> {
    let job_id = path.into_inner();
    let req = body.into_inner();
    let job = fetch_owned_job(&pool, job_id, auth.user_id).await?;

    let status = JobStatus::parse(&job.status).unwrap_or(JobStatus::Failed);
    if status.is_terminal() {
        return Err(AppError::InvalidInput(format!(
            "Cannot update a {} job",
            job.status
        )));
    }

    if let Some(title) = &req.title {
        validate_title(title)?;
    }
    if let Some(description) = &req.description {
        validate_description(description)?;
    }
    if let Some(parameters) = &req.parameters {
        let job_type = JobType::parse(&job.job_type)
            .ok_or_else(|| AppError::Internal(format!("Job {} has unknown type", job.id)))?;
        JobParams::parse(job_type, parameters).map_err(AppError::InvalidInput)?;
    }

    let updated = pool.update_job_fields(job_id, &req).await?;
    Ok(HttpResponse::Ok().json(JobResponse::from(updated)))
}

/// Cancel a pending or processing job.
///
/// The running task notices the status change at its next guarded write and
/// stops without touching the row again.
#[utoipa::path(
    post,
    path = "/api/jobs/{id}/cancel",
    tag = "Jobs",
    params(("id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job cancelled", body = JobResponse),
        (status = 400, description = "Job already finished"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Job not found")
    ),
    security(("bearer_auth" = []))
)]
#[post("/{id}/cancel")]
pub async fn cancel_job(
    pool: web::Data<DbPool>,
    ctx: web::Data<PipelineContext>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let job_id = path.into_inner();
    fetch_owned_job(&pool, job_id, auth.user_id).await?;

    let cancelled = pool.cancel_job(job_id).await?;
    if !cancelled {
        return Err(AppError::InvalidInput(
            "Only pending or processing jobs can be cancelled".to_string(),
        ));
    }

    let failed_steps = pool.fail_running_steps(job_id, "Job was cancelled").await?;
    info!(job_id = %job_id, failed_steps, "Job cancelled");
    ctx.broadcaster.send(JobEventMessage::new(JobEvent::finished(
        job_id,
        auth.user_id,
        JobStatus::Cancelled,
        None,
    )));

    let job = fetch_owned_job(&pool, job_id, auth.user_id).await?;
    Ok(HttpResponse::Ok().json(JobResponse::from(job)))
}

/// External progress update hook.
///
/// Writes unconditionally, unlike the task-side guarded updates. Meant for
/// out-of-process workers reporting on jobs this server did not spawn.
#[utoipa::path(
    put,
    path = "/api/jobs/{id}/progress",
    tag = "Jobs",
    params(("id" = Uuid, Path, description = "Job id")),
    request_body = ProgressUpdateRequest,
    responses(
        (status = 200, description = "Progress recorded", body = JobResponse),
        (status = 400, description = "Progress out of range"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Job not found")
    ),
    security(("bearer_auth" = []))
)]
#[put("/{id}/progress")]
pub async fn update_progress(
    pool: web::Data<DbPool>,
    ctx: web::Data<PipelineContext>,
    auth: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<ProgressUpdateRequest>,
) -> AppResult<HttpResponse> {
    let job_id = path.into_inner();
    let req = body.into_inner();

    if !(0..=100).contains(&req.progress_percentage) {
        return Err(AppError::InvalidInput(
            "Progress percentage must be between 0 and 100".to_string(),
        ));
    }
    if let Some(message) = &req.message {
        if message.chars().count() > 500 {
            return Err(AppError::InvalidInput(
                "Progress message must be at most 500 characters".to_string(),
            ));
        }
    }

    fetch_owned_job(&pool, job_id, auth.user_id).await?;
    let updated = pool
        .update_job_progress(job_id, req.progress_percentage, req.message.as_deref())
        .await?;

    let status = JobStatus::parse(&updated.status).unwrap_or(JobStatus::Processing);
    ctx.broadcaster.send(JobEventMessage::new(JobEvent::progress(
        job_id,
        auth.user_id,
        status,
        req.progress_percentage,
        req.message,
    )));
    Ok(HttpResponse::Ok().json(JobResponse::from(updated)))
}

/// List the steps of a job in execution order.
#[utoipa::path(
    get,
    path = "/api/jobs/{id}/steps",
    tag = "Jobs",
    params(("id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Steps for the job", body = StepListResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Job not found")
    ),
    security(("bearer_auth" = []))
)]
#[get("/{id}/steps")]
pub async fn list_steps(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let job_id = path.into_inner();
    fetch_owned_job(&pool, job_id, auth.user_id).await?;

    let steps = pool.list_job_steps(job_id).await?;
    let response = StepListResponse {
        steps: steps.into_iter().map(JobStepResponse::from).collect(),
    };
    Ok(HttpResponse::Ok().json(response))
}

/// Append a step to a job.
#[utoipa::path(
    post,
    path = "/api/jobs/{id}/steps",
    tag = "Jobs",
    params(("id" = Uuid, Path, description = "Job id")),
    request_body = CreateStepRequest,
    responses(
        (status = 201, description = "Step created", body = JobStepResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Job not found")
    ),
    security(("bearer_auth" = []))
)]
#[post("/{id}/steps")]
pub async fn create_step(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<CreateStepRequest>,
) -> AppResult<HttpResponse> {
    let job_id = path.into_inner();
    let req = body.into_inner();

    let name_len = req.name.trim().chars().count();
    if name_len == 0 {
        return Err(AppError::InvalidInput(
            "Step name cannot be empty".to_string(),
        ));
    }
    if name_len > 100 {
        return Err(AppError::InvalidInput(
            "Step name must be at most 100 characters".to_string(),
        ));
    }
    if let Some(description) = &req.description {
        if description.chars().count() > 500 {
            return Err(AppError::InvalidInput(
                "Step description must be at most 500 characters".to_string(),
            ));
        }
    }
    if let Some(duration) = req.estimated_duration {
        validate_estimated_duration(duration)?;
    }

    fetch_owned_job(&pool, job_id, auth.user_id).await?;

    let step_order = match req.step_order {
        Some(order) => order,
        None => pool.next_step_order(job_id).await?,
    };
    let step = pool
        .insert_job_step(NewJobStep {
            id: Uuid::now_v7(),
            job_id,
            name: req.name.trim().to_string(),
            description: req.description,
            step_order,
            estimated_duration: req.estimated_duration,
            input_data: req.input_data,
        })
        .await?;

    Ok(HttpResponse::Created().json(JobStepResponse::from(step)))
}

/// Minimal polling payload for progress UIs.
#[utoipa::path(
    get,
    path = "/api/jobs/{id}/status",
    tag = "Jobs",
    params(("id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job status snapshot", body = JobPollResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Job not found")
    ),
    security(("bearer_auth" = []))
)]
#[get("/{id}/status")]
pub async fn poll_job(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let job_id = path.into_inner();
    let job = fetch_owned_job(&pool, job_id, auth.user_id).await?;

    let response = JobPollResponse {
        job_id: job.id,
        status: JobStatus::parse(&job.status).unwrap_or(JobStatus::Failed),
        progress_percentage: job.progress_percentage,
        created_at: job.created_at,
        started_at: job.started_at,
        completed_at: job.completed_at,
        task_id: job.task_id,
        results: job.results,
    };
    Ok(HttpResponse::Ok().json(response))
}

/// Delete a job and its steps.
#[utoipa::path(
    delete,
    path = "/api/jobs/{id}",
    tag = "Jobs",
    params(("id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job deleted", body = DeleteJobResponse),
        (status = 400, description = "Job is still processing"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Job not found")
    ),
    security(("bearer_auth" = []))
)]
#[delete("/{id}")]
pub async fn delete_job(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let job_id = path.into_inner();
    let job = fetch_owned_job(&pool, job_id, auth.user_id).await?;

    if job.status == JobStatus::Processing.as_str() {
        return Err(AppError::InvalidInput(
            "Cannot delete a processing job. Cancel it first.".to_string(),
        ));
    }

    pool.delete_job(job_id).await?;
    if job.task_id.is_some() {
        warn!(job_id = %job_id, "Deleted a job that had been claimed by a task");
    }

    Ok(HttpResponse::Ok().json(DeleteJobResponse {
        message: "Job deleted successfully".to_string(),
        job_id,
    }))
}

async fn fetch_owned_job(pool: &DbPool, job_id: Uuid, user_id: Uuid) -> AppResult<job::Model> {
    pool.get_job_for_user(job_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {}", job_id)))
}
