//! Full pipeline saga: script -> speech -> video.
//!
//! After each stage commits its artifact, a checkpoint is persisted on the
//! job row. When the task runs over a job that already carries checkpoints,
//! completed stages are skipped and their stored artifacts reused, so an
//! interrupted pipeline never repeats a paid model call.

use chrono::Utc;
use serde_json::{json, Map, Value as JsonValue};
use tracing::info;
use uuid::Uuid;

use crate::entity::job;
use crate::error::{AppError, AppResult};
use crate::models::{
    AssetType, FullPipelineParams, FullPipelineResults, PipelineCheckpoint, PipelineStage,
    ScriptGenerationParams, StageCheckpoint,
};
use crate::services::pipeline::{
    begin_step, download_input, milestone, read_scratch, record_skipped_step, store_generated,
    write_scratch, PipelineContext, StageOutcome,
};

pub async fn run(
    ctx: &PipelineContext,
    job: &job::Model,
    params: &FullPipelineParams,
) -> StageOutcome {
    let pipeline = "pipeline".to_string();

    if !milestone(ctx, job, 5, "Starting full pipeline")
        .await
        .map_err(|e| (pipeline.clone(), e))?
    {
        return Ok(None);
    }

    let mut checkpoint = PipelineCheckpoint::from_json(job.checkpoint.as_ref());
    let mut service_metadata = metadata_map(job.service_metadata.as_ref());

    // ---- Script ------------------------------------------------------------
    let stage = PipelineStage::Script.as_str().to_string();
    let (script_text, script_asset_id) = match script_stage(
        ctx,
        job,
        params,
        &mut checkpoint,
        &mut service_metadata,
    )
    .await
    .map_err(|e| (stage, e))?
    {
        Some(outcome) => outcome,
        None => return Ok(None),
    };

    // ---- Speech ------------------------------------------------------------
    let stage = PipelineStage::Speech.as_str().to_string();
    let (audio_asset_id, audio) = match speech_stage(
        ctx,
        job,
        params,
        &script_text,
        &mut checkpoint,
        &mut service_metadata,
    )
    .await
    .map_err(|e| (stage, e))?
    {
        Some(outcome) => outcome,
        None => return Ok(None),
    };

    // ---- Video -------------------------------------------------------------
    let stage = PipelineStage::Video.as_str().to_string();
    let video_asset_id = match video_stage(
        ctx,
        job,
        params,
        audio,
        &mut checkpoint,
        &mut service_metadata,
    )
    .await
    .map_err(|e| (stage, e))?
    {
        Some(outcome) => outcome,
        None => return Ok(None),
    };

    if !milestone(ctx, job, 95, "Finalizing results")
        .await
        .map_err(|e| (pipeline.clone(), e))?
    {
        return Ok(None);
    }

    let results = FullPipelineResults {
        script_asset_id,
        audio_asset_id,
        video_asset_id,
    };
    let value = serde_json::to_value(results)
        .map_err(|e| (pipeline, AppError::Internal(format!("Failed to serialize results: {}", e))))?;
    Ok(Some(value))
}

/// Produce the script text. Three paths: supplied by the caller, reused from
/// a checkpoint, or generated fresh.
async fn script_stage(
    ctx: &PipelineContext,
    job: &job::Model,
    params: &FullPipelineParams,
    checkpoint: &mut PipelineCheckpoint,
    service_metadata: &mut Map<String, JsonValue>,
) -> AppResult<Option<(String, Option<Uuid>)>> {
    if let Some(text) = params.script_text.as_deref().filter(|t| !t.trim().is_empty()) {
        if !milestone(ctx, job, 15, "Using supplied script").await? {
            return Ok(None);
        }
        record_skipped_step(ctx, job, "Generate script", Some("Script supplied by caller"))
            .await?;
        return Ok(Some((text.to_string(), None)));
    }

    if let Some(cp) = checkpoint.get(PipelineStage::Script) {
        if !milestone(ctx, job, 15, "Reusing generated script").await? {
            return Ok(None);
        }
        info!(job_id = %job.id, asset_id = %cp.asset_id, "Script stage checkpointed, reusing");
        let (bytes, _) = ctx.storage.get(&cp.storage_path).await?;
        let text = String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("Checkpointed script is not UTF-8: {}", e)))?;
        record_skipped_step(ctx, job, "Generate script", Some("Reused from checkpoint"))
            .await?;
        return Ok(Some((text, Some(cp.asset_id))));
    }

    if !milestone(ctx, job, 15, "Generating lecture script").await? {
        return Ok(None);
    }

    let step = begin_step(
        ctx,
        job,
        "Generate script",
        Some("Generate the lecture script with the hosted language model"),
        Some(json!({ "topic": params.topic })),
    )
    .await?;

    let script_params = ScriptGenerationParams {
        topic: params.topic.clone().unwrap_or_default(),
        target_audience: params.target_audience.clone(),
        duration_minutes: params.duration_minutes,
        style: params.style.clone(),
        additional_context: params.additional_context.clone(),
        prompt: None,
    };
    let generated = ctx.ai.llm.generate_script(&script_params).await?;

    let asset = store_generated(
        ctx,
        job,
        "scripts",
        "script.txt",
        AssetType::Script,
        generated.script.clone().into_bytes(),
        Some(json!({ "analysis": generated.analysis })),
    )
    .await?;

    service_metadata.insert("llm".to_string(), json!(ctx.ai.llm_info()));
    if !commit_stage(
        ctx,
        job,
        checkpoint,
        service_metadata,
        StageCheckpoint {
            stage: PipelineStage::Script,
            asset_id: asset.id,
            storage_path: asset.storage_path,
            completed_at: Utc::now(),
        },
    )
    .await?
    {
        return Ok(None);
    }

    ctx.db
        .complete_job_step(step.id, Some(json!({ "script_asset_id": asset.id })))
        .await?;
    Ok(Some((generated.script, Some(asset.id))))
}

/// Synthesize the script, or pull the audio back from a checkpointed asset.
/// Returns the audio bytes for the video stage alongside the asset id.
async fn speech_stage(
    ctx: &PipelineContext,
    job: &job::Model,
    params: &FullPipelineParams,
    script_text: &str,
    checkpoint: &mut PipelineCheckpoint,
    service_metadata: &mut Map<String, JsonValue>,
) -> AppResult<Option<(Uuid, Vec<u8>)>> {
    if let Some(cp) = checkpoint.get(PipelineStage::Speech) {
        if !milestone(ctx, job, 35, "Reusing generated speech").await? {
            return Ok(None);
        }
        info!(job_id = %job.id, asset_id = %cp.asset_id, "Speech stage checkpointed, reusing");
        let (audio, _) = ctx.storage.get(&cp.storage_path).await?;
        record_skipped_step(ctx, job, "Synthesize speech", Some("Reused from checkpoint"))
            .await?;
        return Ok(Some((cp.asset_id, audio)));
    }

    if !milestone(ctx, job, 35, "Generating speech").await? {
        return Ok(None);
    }

    let (voice_asset, voice_path) =
        download_input(ctx, job, params.voice_asset_id, &[AssetType::VoiceSample]).await?;

    let step = begin_step(
        ctx,
        job,
        "Synthesize speech",
        Some("Clone the voice sample and synthesize the script"),
        Some(json!({
            "voice_asset_id": params.voice_asset_id,
            "text_length": script_text.chars().count(),
        })),
    )
    .await?;

    let voice_sample = read_scratch(&voice_path).await?;
    let generated = ctx
        .ai
        .tts
        .generate_speech(script_text, &voice_asset.filename, voice_sample)
        .await?;

    if !milestone(ctx, job, 55, "Storing generated audio").await? {
        return Ok(None);
    }

    write_scratch(ctx, job.id, "speech.wav", &generated.audio).await?;
    let audio = generated.audio.clone();

    let asset = store_generated(
        ctx,
        job,
        "audio",
        "speech.wav",
        AssetType::GeneratedAudio,
        generated.audio,
        Some(json!({
            "seed": generated.seed,
            "source_voice_asset_id": params.voice_asset_id,
        })),
    )
    .await?;

    service_metadata.insert("tts".to_string(), json!(ctx.ai.tts_info()));
    if !commit_stage(
        ctx,
        job,
        checkpoint,
        service_metadata,
        StageCheckpoint {
            stage: PipelineStage::Speech,
            asset_id: asset.id,
            storage_path: asset.storage_path,
            completed_at: Utc::now(),
        },
    )
    .await?
    {
        return Ok(None);
    }

    ctx.db
        .complete_job_step(step.id, Some(json!({ "audio_asset_id": asset.id })))
        .await?;
    Ok(Some((asset.id, audio)))
}

async fn video_stage(
    ctx: &PipelineContext,
    job: &job::Model,
    params: &FullPipelineParams,
    audio: Vec<u8>,
    checkpoint: &mut PipelineCheckpoint,
    service_metadata: &mut Map<String, JsonValue>,
) -> AppResult<Option<Uuid>> {
    if let Some(cp) = checkpoint.get(PipelineStage::Video) {
        if !milestone(ctx, job, 75, "Reusing generated video").await? {
            return Ok(None);
        }
        info!(job_id = %job.id, asset_id = %cp.asset_id, "Video stage checkpointed, reusing");
        record_skipped_step(ctx, job, "Generate video", Some("Reused from checkpoint")).await?;
        return Ok(Some(cp.asset_id));
    }

    if !milestone(ctx, job, 75, "Generating video").await? {
        return Ok(None);
    }

    let (portrait_asset, portrait_path) =
        download_input(ctx, job, params.portrait_asset_id, &[AssetType::Portrait]).await?;

    let step = begin_step(
        ctx,
        job,
        "Generate video",
        Some("Animate the portrait with the synthesized audio"),
        Some(json!({ "portrait_asset_id": params.portrait_asset_id })),
    )
    .await?;

    let portrait = read_scratch(&portrait_path).await?;
    let video = ctx
        .ai
        .video
        .generate_video(&portrait_asset.filename, portrait, "speech.wav", audio)
        .await?;

    write_scratch(ctx, job.id, "lecture.mp4", &video).await?;

    let asset = store_generated(
        ctx,
        job,
        "videos",
        "lecture.mp4",
        AssetType::GeneratedVideo,
        video,
        Some(json!({ "portrait_asset_id": params.portrait_asset_id })),
    )
    .await?;

    service_metadata.insert("video".to_string(), json!(ctx.ai.video_info()));
    if !commit_stage(
        ctx,
        job,
        checkpoint,
        service_metadata,
        StageCheckpoint {
            stage: PipelineStage::Video,
            asset_id: asset.id,
            storage_path: asset.storage_path,
            completed_at: Utc::now(),
        },
    )
    .await?
    {
        return Ok(None);
    }

    ctx.db
        .complete_job_step(step.id, Some(json!({ "video_asset_id": asset.id })))
        .await?;
    Ok(Some(asset.id))
}

/// Persist the checkpoint and accumulated service metadata for a completed
/// stage. Returns false when the job has left the processing state.
async fn commit_stage(
    ctx: &PipelineContext,
    job: &job::Model,
    checkpoint: &mut PipelineCheckpoint,
    service_metadata: &Map<String, JsonValue>,
    completed: StageCheckpoint,
) -> AppResult<bool> {
    let stage = completed.stage;
    checkpoint.record(completed);

    if !ctx
        .db
        .set_job_service_metadata(job.id, JsonValue::Object(service_metadata.clone()))
        .await?
    {
        return Ok(false);
    }
    if !ctx.db.set_job_checkpoint(job.id, checkpoint.to_json()).await? {
        return Ok(false);
    }
    info!(job_id = %job.id, stage = %stage, "Pipeline stage checkpointed");
    Ok(true)
}

fn metadata_map(existing: Option<&JsonValue>) -> Map<String, JsonValue> {
    match existing {
        Some(JsonValue::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}
