//! Background job pipeline.
//!
//! Every generation job runs as a detached tokio task spawned from the API
//! layer. A task first claims its job row (pending -> processing, conditional
//! UPDATE), then drives exactly one external service call per stage, uploads
//! the produced artifact and records a typed result. All task-side writes are
//! guarded on `status = 'processing'` so a concurrent user cancel always wins;
//! when a guard reports no rows the task stops quietly.
//!
//! The database row is the only source of truth. Progress events on the
//! broadcast channel are advisory snapshots for connected WebSocket clients.

pub mod full;
pub mod script;
pub mod speech;
pub mod video;
pub mod voice_clone;

use std::path::PathBuf;

use serde_json::{json, Value as JsonValue};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::assets::NewAsset;
use crate::db::job_steps::NewJobStep;
use crate::db::DbPool;
use crate::entity::{asset, job, job_step};
use crate::error::{AppError, AppResult};
use crate::models::{
    AssetStatus, AssetType, JobEvent, JobEventMessage, JobStatus, JobType,
};
use crate::services::ai::AiClients;
use crate::services::{EventBroadcaster, Storage};

/// Shared handles a pipeline task needs.
#[derive(Clone)]
pub struct PipelineContext {
    pub db: DbPool,
    pub storage: Storage,
    pub ai: AiClients,
    pub broadcaster: EventBroadcaster,
    pub data_dir: PathBuf,
}

impl PipelineContext {
    pub fn new(
        db: DbPool,
        storage: Storage,
        ai: AiClients,
        broadcaster: EventBroadcaster,
        data_dir: PathBuf,
    ) -> Self {
        Self {
            db,
            storage,
            ai,
            broadcaster,
            data_dir,
        }
    }
}

/// Outcome of a stage runner.
///
/// `Ok(Some(results))` carries the typed results payload, `Ok(None)` means a
/// status guard reported the job left `processing` and the task must stop.
/// Errors carry the stage label for `error_info`.
pub(crate) type StageOutcome = Result<Option<JsonValue>, (String, AppError)>;

/// Spawn the background task for a freshly created pending job.
///
/// Returns the task id the spawned task will claim the job with.
pub fn spawn_job(ctx: &PipelineContext, job: job::Model) -> Uuid {
    let task_id = Uuid::now_v7();
    let ctx = ctx.clone();
    tokio::spawn(async move {
        run_job(ctx, job, task_id).await;
    });
    task_id
}

async fn run_job(ctx: PipelineContext, job: job::Model, task_id: Uuid) {
    let job_id = job.id;

    let claimed = match ctx.db.claim_job(job_id, task_id).await {
        Ok(claimed) => claimed,
        Err(e) => {
            error!(%job_id, "Failed to claim job: {}", e);
            return;
        }
    };
    if !claimed {
        // Another task got it first or the user already cancelled.
        debug!(%job_id, %task_id, "Job is no longer pending, task exits");
        return;
    }

    info!(%job_id, %task_id, job_type = %job.job_type, "Job claimed");
    ctx.broadcaster.send(JobEventMessage::new(JobEvent::progress(
        job_id,
        job.user_id,
        JobStatus::Processing,
        0,
        Some("Job started".to_string()),
    )));

    let outcome = dispatch(&ctx, &job).await;

    match outcome {
        Ok(Some(results)) => match ctx.db.complete_job(job_id, results).await {
            Ok(true) => {
                info!(%job_id, "Job completed");
                ctx.broadcaster.send(JobEventMessage::new(JobEvent::finished(
                    job_id,
                    job.user_id,
                    JobStatus::Completed,
                    None,
                )));
            }
            Ok(false) => {
                info!(%job_id, "Job was cancelled before completion could commit");
            }
            Err(e) => error!(%job_id, "Failed to record job completion: {}", e),
        },
        Ok(None) => {
            info!(%job_id, "Job left processing state, task stopped");
        }
        Err((stage, err)) => {
            let message = err.to_string();
            warn!(%job_id, stage = %stage, "Job failed: {}", message);

            let error_info = json!({
                "message": message,
                "stage": stage,
                "task_id": task_id,
            });
            match ctx.db.fail_job(job_id, error_info).await {
                Ok(true) => {
                    if let Err(e) = ctx.db.fail_running_steps(job_id, &message).await {
                        warn!(%job_id, "Failed to mark running steps failed: {}", e);
                    }
                    ctx.broadcaster.send(JobEventMessage::new(JobEvent::finished(
                        job_id,
                        job.user_id,
                        JobStatus::Failed,
                        Some(message),
                    )));
                }
                Ok(false) => {
                    debug!(%job_id, "Job already terminal, failure not recorded");
                }
                Err(e) => error!(%job_id, "Failed to record job failure: {}", e),
            }
        }
    }

    cleanup_scratch(&ctx, job_id).await;
}

async fn dispatch(ctx: &PipelineContext, job: &job::Model) -> StageOutcome {
    let Some(job_type) = JobType::parse(&job.job_type) else {
        return Err((
            "dispatch".to_string(),
            AppError::InvalidInput(format!("Unknown job type: {}", job.job_type)),
        ));
    };

    match job_type {
        JobType::ScriptGeneration => {
            let params = parse_params(job).map_err(|e| (job_type.as_str().to_string(), e))?;
            script::run(ctx, job, &params)
                .await
                .map_err(|e| (job_type.as_str().to_string(), e))
        }
        JobType::TextToSpeech => {
            let params = parse_params(job).map_err(|e| (job_type.as_str().to_string(), e))?;
            speech::run(ctx, job, &params)
                .await
                .map_err(|e| (job_type.as_str().to_string(), e))
        }
        JobType::VideoGeneration => {
            let params = parse_params(job).map_err(|e| (job_type.as_str().to_string(), e))?;
            video::run(ctx, job, &params)
                .await
                .map_err(|e| (job_type.as_str().to_string(), e))
        }
        JobType::VoiceClone => {
            let params = parse_params(job).map_err(|e| (job_type.as_str().to_string(), e))?;
            voice_clone::run(ctx, job, &params)
                .await
                .map_err(|e| (job_type.as_str().to_string(), e))
        }
        JobType::FullPipeline => {
            let params =
                parse_params(job).map_err(|e| (job_type.as_str().to_string(), e))?;
            full::run(ctx, job, &params).await
        }
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(job: &job::Model) -> AppResult<T> {
    serde_json::from_value(job.parameters.clone()).map_err(|e| {
        AppError::InvalidInput(format!(
            "Job parameters do not match job type {}: {}",
            job.job_type, e
        ))
    })
}

// ============================================================================
// Shared stage helpers
// ============================================================================

/// Commit a progress milestone and broadcast it.
///
/// Returns false when the job is no longer `processing`; the stage must then
/// return `Ok(None)` without further writes.
pub(crate) async fn milestone(
    ctx: &PipelineContext,
    job: &job::Model,
    pct: i32,
    message: &str,
) -> AppResult<bool> {
    let updated = ctx
        .db
        .update_job_progress_if_processing(job.id, pct, Some(message))
        .await?;

    if updated {
        ctx.broadcaster.send(JobEventMessage::new(JobEvent::progress(
            job.id,
            job.user_id,
            JobStatus::Processing,
            pct,
            Some(message.to_string()),
        )));
    } else {
        info!(job_id = %job.id, pct, "Milestone refused, job left processing");
    }
    Ok(updated)
}

/// Per-job scratch directory for ephemeral working files.
pub(crate) fn scratch_dir(ctx: &PipelineContext, job_id: Uuid) -> PathBuf {
    ctx.data_dir.join("scratch").join(job_id.to_string())
}

/// Write bytes into the job's scratch directory.
pub(crate) async fn write_scratch(
    ctx: &PipelineContext,
    job_id: Uuid,
    filename: &str,
    bytes: &[u8],
) -> AppResult<PathBuf> {
    let dir = scratch_dir(ctx, job_id);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create scratch directory: {}", e)))?;

    let path = dir.join(filename);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to write scratch file: {}", e)))?;
    Ok(path)
}

/// Read a scratch file back.
pub(crate) async fn read_scratch(path: &std::path::Path) -> AppResult<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read scratch file: {}", e)))
}

/// Remove the scratch directory. Never fatal.
async fn cleanup_scratch(ctx: &PipelineContext, job_id: Uuid) {
    let dir = scratch_dir(ctx, job_id);
    match tokio::fs::remove_dir_all(&dir).await {
        Ok(()) => debug!(%job_id, "Scratch directory removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(%job_id, "Failed to remove scratch directory: {}", e),
    }
}

/// Resolve an input asset by id and owner, then download it into scratch.
///
/// The API validates referenced assets before the job is created, so a miss
/// here means the asset was deleted in the meantime. Wrong type or a
/// non-ready status is a terminal stage failure either way.
pub(crate) async fn download_input(
    ctx: &PipelineContext,
    job: &job::Model,
    asset_id: Uuid,
    expected: &[AssetType],
) -> AppResult<(asset::Model, PathBuf)> {
    let asset = ctx
        .db
        .get_asset_for_user(asset_id, job.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Input asset {}", asset_id)))?;

    let asset_type = AssetType::parse(&asset.asset_type).ok_or_else(|| {
        AppError::Internal(format!(
            "Asset {} has unknown type {}",
            asset.id, asset.asset_type
        ))
    })?;
    if !expected.contains(&asset_type) {
        let wanted = expected
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(" or ");
        return Err(AppError::InvalidInput(format!(
            "Asset {} has type {} where {} is required",
            asset_id, asset.asset_type, wanted
        )));
    }
    if asset.status != AssetStatus::Ready.as_str() {
        return Err(AppError::InvalidInput(format!(
            "Asset {} is not ready (status: {})",
            asset_id, asset.status
        )));
    }

    let (bytes, _) = ctx.storage.get(&asset.storage_path).await?;
    let path = write_scratch(ctx, job.id, &asset.filename, &bytes).await?;
    Ok((asset, path))
}

/// Upload a produced artifact and record its asset row.
///
/// The row is inserted as `processing` first so a storage failure leaves an
/// `error` asset instead of a `ready` one without an object behind it.
pub(crate) async fn store_generated(
    ctx: &PipelineContext,
    job: &job::Model,
    category: &str,
    filename: &str,
    asset_type: AssetType,
    bytes: Vec<u8>,
    metadata: Option<JsonValue>,
) -> AppResult<asset::Model> {
    let key = Storage::generated_key(category, job.id, filename);
    let extension = filename.rsplit_once('.').map(|(_, ext)| ext.to_string());
    let content_type = extension.as_deref().map(Storage::content_type_for_extension);

    let asset = ctx
        .db
        .insert_asset(NewAsset {
            id: Uuid::now_v7(),
            user_id: job.user_id,
            filename: filename.to_string(),
            original_filename: filename.to_string(),
            asset_type,
            status: AssetStatus::Processing,
            storage_path: key.clone(),
            storage_bucket: ctx.storage.bucket().to_string(),
            file_size: None,
            mime_type: content_type.map(String::from),
            file_extension: extension,
            metadata,
        })
        .await?;

    let size = bytes.len() as i64;
    if let Err(e) = ctx.storage.put(&key, bytes, content_type).await {
        if let Err(mark) = ctx.db.mark_asset_error(asset.id, &e.to_string()).await {
            warn!(asset_id = %asset.id, "Failed to mark asset as errored: {}", mark);
        }
        return Err(e);
    }

    let ready = ctx.db.mark_asset_ready(asset.id, Some(size)).await?;
    info!(
        asset_id = %ready.id,
        key = %key,
        size,
        "Generated asset stored"
    );
    Ok(ready)
}

/// Insert a step row for a stage and mark it running.
pub(crate) async fn begin_step(
    ctx: &PipelineContext,
    job: &job::Model,
    name: &str,
    description: Option<&str>,
    input_data: Option<JsonValue>,
) -> AppResult<job_step::Model> {
    let order = ctx.db.next_step_order(job.id).await?;
    let step = ctx
        .db
        .insert_job_step(NewJobStep {
            id: Uuid::now_v7(),
            job_id: job.id,
            name: name.to_string(),
            description: description.map(String::from),
            step_order: order,
            estimated_duration: None,
            input_data,
        })
        .await?;
    ctx.db.start_job_step(step.id).await?;
    Ok(step)
}

/// Insert a step row already marked skipped (checkpointed or bypassed stage).
pub(crate) async fn record_skipped_step(
    ctx: &PipelineContext,
    job: &job::Model,
    name: &str,
    description: Option<&str>,
) -> AppResult<()> {
    let order = ctx.db.next_step_order(job.id).await?;
    let step = ctx
        .db
        .insert_job_step(NewJobStep {
            id: Uuid::now_v7(),
            job_id: job.id,
            name: name.to_string(),
            description: description.map(String::from),
            step_order: order,
            estimated_duration: None,
            input_data: None,
        })
        .await?;
    ctx.db.skip_job_step(step.id).await?;
    Ok(())
}

/// Truncate a script for the results preview.
pub(crate) fn script_preview(script: &str) -> String {
    const PREVIEW_CHARS: usize = 500;
    if script.chars().count() <= PREVIEW_CHARS {
        script.to_string()
    } else {
        let cut: String = script.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_preview_truncation() {
        assert_eq!(script_preview("short"), "short");

        let long = "x".repeat(600);
        let preview = script_preview(&long);
        assert_eq!(preview.chars().count(), 503);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_script_preview_multibyte_boundary() {
        let long = "ü".repeat(501);
        let preview = script_preview(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 503);
    }
}
