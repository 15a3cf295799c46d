//! Video generation stage: drive a portrait with audio through the hosted
//! KDTalker space.

use serde_json::json;

use crate::entity::job;
use crate::error::{AppError, AppResult};
use crate::models::{AssetType, VideoGenerationParams, VideoGenerationResults};
use crate::services::pipeline::{
    begin_step, download_input, milestone, read_scratch, store_generated, write_scratch,
    PipelineContext,
};

pub async fn run(
    ctx: &PipelineContext,
    job: &job::Model,
    params: &VideoGenerationParams,
) -> AppResult<Option<serde_json::Value>> {
    if !milestone(ctx, job, 5, "Initializing video generation").await? {
        return Ok(None);
    }

    let step = begin_step(
        ctx,
        job,
        "Generate video",
        Some("Animate the portrait with the driving audio"),
        Some(json!({
            "portrait_asset_id": params.portrait_asset_id,
            "audio_asset_id": params.audio_asset_id,
        })),
    )
    .await?;

    if !milestone(ctx, job, 20, "Preparing input assets").await? {
        return Ok(None);
    }

    let (portrait_asset, portrait_path) =
        download_input(ctx, job, params.portrait_asset_id, &[AssetType::Portrait]).await?;
    // Generated audio from an earlier job or a raw voice sample both work as
    // the driving track.
    let (audio_asset, audio_path) = download_input(
        ctx,
        job,
        params.audio_asset_id,
        &[AssetType::GeneratedAudio, AssetType::VoiceSample],
    )
    .await?;

    if !milestone(ctx, job, 60, "Generating talking-head video").await? {
        return Ok(None);
    }

    let portrait = read_scratch(&portrait_path).await?;
    let audio = read_scratch(&audio_path).await?;
    let video = ctx
        .ai
        .video
        .generate_video(&portrait_asset.filename, portrait, &audio_asset.filename, audio)
        .await?;

    if !milestone(ctx, job, 90, "Finalizing video").await? {
        return Ok(None);
    }

    write_scratch(ctx, job.id, "lecture.mp4", &video).await?;
    let file_size = video.len() as u64;

    let asset = store_generated(
        ctx,
        job,
        "videos",
        "lecture.mp4",
        AssetType::GeneratedVideo,
        video,
        Some(json!({
            "portrait_asset_id": params.portrait_asset_id,
            "audio_asset_id": params.audio_asset_id,
        })),
    )
    .await?;

    let metadata = json!({ "video": ctx.ai.video_info() });
    if !ctx.db.set_job_service_metadata(job.id, metadata).await? {
        return Ok(None);
    }

    ctx.db
        .complete_job_step(step.id, Some(json!({ "video_asset_id": asset.id })))
        .await?;

    let results = VideoGenerationResults {
        video_asset_id: asset.id,
        storage_path: asset.storage_path,
        file_size,
    };
    let value = serde_json::to_value(results)
        .map_err(|e| AppError::Internal(format!("Failed to serialize results: {}", e)))?;
    Ok(Some(value))
}
