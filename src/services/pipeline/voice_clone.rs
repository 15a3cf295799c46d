//! Voice clone preparation stage.
//!
//! Zonos clones directly from the reference sample at synthesis time, so
//! there is no embedding to train. This stage validates that the sample is
//! usable and records it as the cloning source.

use serde_json::json;

use crate::entity::job;
use crate::error::{AppError, AppResult};
use crate::models::{AssetStatus, AssetType, VoiceCloneParams, VoiceCloneResults};
use crate::services::pipeline::{begin_step, milestone, PipelineContext};

pub async fn run(
    ctx: &PipelineContext,
    job: &job::Model,
    params: &VoiceCloneParams,
) -> AppResult<Option<serde_json::Value>> {
    if !milestone(ctx, job, 10, "Initializing voice cloning").await? {
        return Ok(None);
    }

    let step = begin_step(
        ctx,
        job,
        "Validate voice sample",
        Some("Check the voice sample is stored and usable for cloning"),
        Some(json!({ "voice_asset_id": params.voice_asset_id })),
    )
    .await?;

    if !milestone(ctx, job, 50, "Processing voice sample").await? {
        return Ok(None);
    }

    let asset = ctx
        .db
        .get_asset_for_user(params.voice_asset_id, job.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Input asset {}", params.voice_asset_id)))?;

    if asset.asset_type != AssetType::VoiceSample.as_str() {
        return Err(AppError::InvalidInput(format!(
            "Asset {} has type {} where voice_sample is required",
            asset.id, asset.asset_type
        )));
    }
    if asset.status != AssetStatus::Ready.as_str() {
        return Err(AppError::InvalidInput(format!(
            "Asset {} is not ready (status: {})",
            asset.id, asset.status
        )));
    }

    let info = ctx
        .storage
        .stat(&asset.storage_path)
        .await?
        .ok_or_else(|| {
            AppError::Internal(format!(
                "Voice sample {} has no object at {}",
                asset.id, asset.storage_path
            ))
        })?;
    let size = info.size.unwrap_or(0);
    if size <= 0 {
        return Err(AppError::InvalidInput(format!(
            "Voice sample {} is empty",
            asset.id
        )));
    }

    if !milestone(ctx, job, 90, "Finalizing voice clone").await? {
        return Ok(None);
    }

    ctx.db
        .complete_job_step(step.id, Some(json!({ "voice_asset_id": asset.id })))
        .await?;

    let results = VoiceCloneResults {
        voice_asset_id: asset.id,
        file_size: size as u64,
        file_extension: asset.file_extension,
    };
    let value = serde_json::to_value(results)
        .map_err(|e| AppError::Internal(format!("Failed to serialize results: {}", e)))?;
    Ok(Some(value))
}
