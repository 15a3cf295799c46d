//! Text-to-speech stage: clone the user's voice sample and synthesize the
//! given text through the hosted Zonos space.

use serde_json::json;

use crate::entity::job;
use crate::error::{AppError, AppResult};
use crate::models::{AssetType, TextToSpeechParams, TextToSpeechResults};
use crate::services::pipeline::{
    begin_step, download_input, milestone, read_scratch, store_generated, write_scratch,
    PipelineContext,
};

pub async fn run(
    ctx: &PipelineContext,
    job: &job::Model,
    params: &TextToSpeechParams,
) -> AppResult<Option<serde_json::Value>> {
    if !milestone(ctx, job, 10, "Preparing text for synthesis").await? {
        return Ok(None);
    }

    let (voice_asset, voice_path) =
        download_input(ctx, job, params.voice_asset_id, &[AssetType::VoiceSample]).await?;

    let step = begin_step(
        ctx,
        job,
        "Synthesize speech",
        Some("Clone the voice sample and synthesize the text"),
        Some(json!({
            "voice_asset_id": params.voice_asset_id,
            "text_length": params.text.chars().count(),
        })),
    )
    .await?;

    if !milestone(ctx, job, 40, "Generating speech").await? {
        return Ok(None);
    }

    let voice_sample = read_scratch(&voice_path).await?;
    let generated = ctx
        .ai
        .tts
        .generate_speech(&params.text, &voice_asset.filename, voice_sample)
        .await?;

    if !milestone(ctx, job, 80, "Processing audio output").await? {
        return Ok(None);
    }

    write_scratch(ctx, job.id, "speech.wav", &generated.audio).await?;
    let file_size = generated.audio.len() as u64;

    let asset = store_generated(
        ctx,
        job,
        "audio",
        "speech.wav",
        AssetType::GeneratedAudio,
        generated.audio,
        Some(json!({
            "seed": generated.seed,
            "text_length": params.text.chars().count(),
            "source_voice_asset_id": params.voice_asset_id,
        })),
    )
    .await?;

    let metadata = json!({ "tts": ctx.ai.tts_info() });
    if !ctx.db.set_job_service_metadata(job.id, metadata).await? {
        return Ok(None);
    }

    ctx.db
        .complete_job_step(step.id, Some(json!({ "audio_asset_id": asset.id })))
        .await?;

    let results = TextToSpeechResults {
        audio_asset_id: asset.id,
        storage_path: asset.storage_path,
        file_size,
        text_length: params.text.chars().count(),
    };
    let value = serde_json::to_value(results)
        .map_err(|e| AppError::Internal(format!("Failed to serialize results: {}", e)))?;
    Ok(Some(value))
}
