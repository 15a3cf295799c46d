//! Worker introspection endpoints.
//!
//! The original deployment ran an external task queue and these endpoints
//! inspected it. Tasks now run in-process and the database is the sole
//! source of truth, so the probes read connectivity and job counts from
//! the same stores the pipeline writes to.

use actix_web::{get, web, HttpResponse};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::JobStatus;
use crate::services::Storage;

/// Connectivity probe result.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WorkerPingResponse {
    pub status: String,
    pub database: String,
    pub storage: String,
}

/// Pending and processing job counts.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WorkerStatusResponse {
    pub pending: u64,
    pub processing: u64,
}

/// Configure worker routes under /api/worker.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/worker")
            .service(ping)
            .service(status)
            .service(task_state),
    );
}

/// Probe database and object storage connectivity.
#[utoipa::path(
    get,
    path = "/api/worker/ping",
    tag = "Worker",
    responses(
        (status = 200, description = "Both stores reachable", body = WorkerPingResponse),
        (status = 503, description = "Database or storage unreachable", body = WorkerPingResponse)
    )
)]
#[get("/ping")]
pub async fn ping(
    pool: web::Data<DbPool>,
    storage: web::Data<Storage>,
) -> AppResult<HttpResponse> {
    let database = match pool.ping().await {
        Ok(()) => "connected".to_string(),
        Err(e) => format!("error: {}", e),
    };
    // A HEAD on a key that does not exist still proves the bucket answers.
    let storage_state = match storage.stat("healthcheck").await {
        Ok(_) => "connected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    let healthy = database == "connected" && storage_state == "connected";
    let response = WorkerPingResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        database,
        storage: storage_state,
    };

    if healthy {
        Ok(HttpResponse::Ok().json(response))
    } else {
        Ok(HttpResponse::ServiceUnavailable().json(response))
    }
}

/// Count jobs waiting for or held by tasks.
#[utoipa::path(
    get,
    path = "/api/worker/status",
    tag = "Worker",
    responses(
        (status = 200, description = "Active job counts", body = WorkerStatusResponse)
    )
)]
#[get("/status")]
pub async fn status(pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let (pending, processing) = pool.count_active_jobs().await?;
    Ok(HttpResponse::Ok().json(WorkerStatusResponse {
        pending,
        processing,
    }))
}

/// Look up a task by id and report it in queue-style state payloads.
///
/// Task ids are only written to job rows at claim time, so an id issued
/// moments ago may not be visible yet. Unknown ids therefore read as
/// PENDING, which is also how the queue this replaced behaved.
#[utoipa::path(
    get,
    path = "/api/worker/task/{task_id}",
    tag = "Worker",
    params(("task_id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task state payload")
    )
)]
#[get("/task/{task_id}")]
pub async fn task_state(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let task_id = path.into_inner();
    let job = pool.get_job_by_task_id(task_id).await?;

    let payload = match job {
        None => json!({
            "task_id": task_id,
            "state": "PENDING",
            "status": "Task is waiting to be processed",
        }),
        Some(job) => match JobStatus::parse(&job.status) {
            Some(JobStatus::Pending) => json!({
                "task_id": task_id,
                "state": "PENDING",
                "status": "Task is waiting to be processed",
            }),
            Some(JobStatus::Processing) => json!({
                "task_id": task_id,
                "state": "PROGRESS",
                "progress": job.progress_percentage,
                "status": job.progress_message.unwrap_or_default(),
            }),
            Some(JobStatus::Completed) => json!({
                "task_id": task_id,
                "state": "SUCCESS",
                "result": job.results,
            }),
            Some(JobStatus::Cancelled) => json!({
                "task_id": task_id,
                "state": "REVOKED",
                "error": "Job was cancelled",
            }),
            Some(JobStatus::Failed) | None => {
                let error = job
                    .error_info
                    .as_ref()
                    .and_then(|info| info.get("message"))
                    .and_then(|m| m.as_str())
                    .unwrap_or("Job failed")
                    .to_string();
                json!({
                    "task_id": task_id,
                    "state": "FAILURE",
                    "error": error,
                })
            }
        },
    };

    Ok(HttpResponse::Ok().json(payload))
}
