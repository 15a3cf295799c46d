//! Script generation stage: one LLM call, script stored as a text asset.

use serde_json::json;

use crate::entity::job;
use crate::error::{AppError, AppResult};
use crate::models::{AssetType, ScriptGenerationParams, ScriptGenerationResults};
use crate::services::pipeline::{
    begin_step, milestone, script_preview, store_generated, PipelineContext,
};

pub async fn run(
    ctx: &PipelineContext,
    job: &job::Model,
    params: &ScriptGenerationParams,
) -> AppResult<Option<serde_json::Value>> {
    if !milestone(ctx, job, 10, "Preparing script generation").await? {
        return Ok(None);
    }

    let step = begin_step(
        ctx,
        job,
        "Generate script",
        Some("Generate the lecture script with the hosted language model"),
        Some(json!({
            "topic": params.topic,
            "duration_minutes": params.duration_minutes,
        })),
    )
    .await?;

    if !milestone(ctx, job, 20, "Generating script content").await? {
        return Ok(None);
    }

    let generated = ctx.ai.llm.generate_script(params).await?;

    if !milestone(ctx, job, 70, "Saving generated script").await? {
        return Ok(None);
    }

    let asset = store_generated(
        ctx,
        job,
        "scripts",
        "script.txt",
        AssetType::Script,
        generated.script.clone().into_bytes(),
        Some(json!({
            "analysis": generated.analysis,
            "generation_time_secs": generated.generation_time_secs,
        })),
    )
    .await?;

    let metadata = json!({ "llm": ctx.ai.llm_info() });
    if !ctx.db.set_job_service_metadata(job.id, metadata).await? {
        return Ok(None);
    }

    ctx.db
        .complete_job_step(step.id, Some(json!({ "script_asset_id": asset.id })))
        .await?;

    if !milestone(ctx, job, 90, "Finalizing script generation").await? {
        return Ok(None);
    }

    let results = ScriptGenerationResults {
        script_asset_id: asset.id,
        script_preview: script_preview(&generated.script),
        analysis: generated.analysis,
    };
    let value = serde_json::to_value(results)
        .map_err(|e| AppError::Internal(format!("Failed to serialize results: {}", e)))?;
    Ok(Some(value))
}
