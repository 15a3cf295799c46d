//! Typed generation triggers.
//!
//! Each endpoint builds the parameter payload for one job type, checks the
//! referenced assets, inserts a pending job, and spawns its task. All five
//! return 202 with `{job_id, task_id, status}`; the caller polls
//! `/api/jobs/{id}/status` or listens on the WebSocket for completion.

use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::jobs::NewJob;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{
    FullPipelineParams, JobAcceptedResponse, JobEvent, JobEventMessage, JobPriority, JobStatus,
    JobType, ScriptGenerationParams, TextToSpeechParams, VideoGenerationParams, VoiceCloneParams,
};
use crate::services::ai::AiClients;
use crate::services::{pipeline, PipelineContext};

use super::jobs::{ensure_assets_owned, validate_title};

/// Request body for script generation.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GenerateScriptRequest {
    /// Job title, defaults to "Script generation".
    #[serde(default)]
    pub title: Option<String>,
    pub topic: String,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub additional_context: Option<String>,
    /// Full prompt override; the topic fields are ignored when set.
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Request body for speech synthesis.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GenerateSpeechRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub text: String,
    pub voice_asset_id: Uuid,
}

/// Request body for video generation.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GenerateVideoRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub portrait_asset_id: Uuid,
    pub audio_asset_id: Uuid,
}

/// Request body for voice-clone validation.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VoiceCloneRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub voice_asset_id: Uuid,
}

/// Request body for the full script -> speech -> video pipeline.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FullPipelineRequest {
    #[serde(default)]
    pub title: Option<String>,
    /// Topic to generate a script from. Ignored when script_text is set.
    #[serde(default)]
    pub topic: Option<String>,
    /// Pre-written script; skips the script generation stage.
    #[serde(default)]
    pub script_text: Option<String>,
    pub voice_asset_id: Uuid,
    pub portrait_asset_id: Uuid,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub additional_context: Option<String>,
}

/// Configure generation routes under /api/generate.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/generate")
            .service(services_health)
            .service(generate_script)
            .service(generate_speech)
            .service(generate_video)
            .service(generate_voice_clone)
            .service(generate_full),
    );
}

fn job_title(title: Option<String>, default: &str) -> AppResult<String> {
    match title {
        Some(title) => {
            validate_title(&title)?;
            Ok(title.trim().to_string())
        }
        None => Ok(default.to_string()),
    }
}

/// Insert a pending job and hand it to the pipeline.
async fn accept_job(
    pool: &DbPool,
    ctx: &PipelineContext,
    user_id: Uuid,
    title: String,
    job_type: JobType,
    parameters: JsonValue,
) -> AppResult<HttpResponse> {
    let job = pool
        .insert_job(NewJob {
            id: Uuid::now_v7(),
            user_id,
            title,
            description: None,
            job_type,
            priority: JobPriority::Normal,
            parameters,
            estimated_duration: None,
        })
        .await?;

    info!(job_id = %job.id, job_type = %job_type, user_id = %user_id, "Generation job accepted");
    ctx.broadcaster.send(JobEventMessage::new(JobEvent::created(
        job.id,
        user_id,
        job_type,
        job.title.clone(),
    )));

    let task_id = pipeline::spawn_job(ctx, job.clone());
    Ok(HttpResponse::Accepted().json(JobAcceptedResponse {
        job_id: job.id,
        task_id,
        status: JobStatus::Pending,
    }))
}

/// Generate a lecture script with the hosted language model.
#[utoipa::path(
    post,
    path = "/api/generate/script",
    tag = "Generate",
    request_body = GenerateScriptRequest,
    responses(
        (status = 202, description = "Script job accepted", body = JobAcceptedResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
#[post("/script")]
pub async fn generate_script(
    pool: web::Data<DbPool>,
    ctx: web::Data<PipelineContext>,
    auth: AuthUser,
    body: web::Json<GenerateScriptRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    if req.topic.trim().is_empty() {
        return Err(AppError::InvalidInput("Topic cannot be empty".to_string()));
    }

    let title = job_title(req.title, "Script generation")?;
    let params = ScriptGenerationParams {
        topic: req.topic,
        target_audience: req.target_audience,
        duration_minutes: req.duration_minutes,
        style: req.style,
        additional_context: req.additional_context,
        prompt: req.prompt,
    };
    accept_job(
        &pool,
        &ctx,
        auth.user_id,
        title,
        JobType::ScriptGeneration,
        serde_json::to_value(&params)?,
    )
    .await
}

/// Synthesize speech from text with a cloned voice.
#[utoipa::path(
    post,
    path = "/api/generate/speech",
    tag = "Generate",
    request_body = GenerateSpeechRequest,
    responses(
        (status = 202, description = "Speech job accepted", body = JobAcceptedResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Voice asset not found")
    ),
    security(("bearer_auth" = []))
)]
#[post("/speech")]
pub async fn generate_speech(
    pool: web::Data<DbPool>,
    ctx: web::Data<PipelineContext>,
    auth: AuthUser,
    body: web::Json<GenerateSpeechRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    if req.text.trim().is_empty() {
        return Err(AppError::InvalidInput("Text cannot be empty".to_string()));
    }

    let title = job_title(req.title, "Speech synthesis")?;
    ensure_assets_owned(&pool, auth.user_id, &[req.voice_asset_id]).await?;

    let params = TextToSpeechParams {
        text: req.text,
        voice_asset_id: req.voice_asset_id,
    };
    accept_job(
        &pool,
        &ctx,
        auth.user_id,
        title,
        JobType::TextToSpeech,
        serde_json::to_value(&params)?,
    )
    .await
}

/// Animate a portrait with a driving audio track.
#[utoipa::path(
    post,
    path = "/api/generate/video",
    tag = "Generate",
    request_body = GenerateVideoRequest,
    responses(
        (status = 202, description = "Video job accepted", body = JobAcceptedResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Portrait or audio asset not found")
    ),
    security(("bearer_auth" = []))
)]
#[post("/video")]
pub async fn generate_video(
    pool: web::Data<DbPool>,
    ctx: web::Data<PipelineContext>,
    auth: AuthUser,
    body: web::Json<GenerateVideoRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let title = job_title(req.title, "Video generation")?;
    ensure_assets_owned(
        &pool,
        auth.user_id,
        &[req.portrait_asset_id, req.audio_asset_id],
    )
    .await?;

    let params = VideoGenerationParams {
        portrait_asset_id: req.portrait_asset_id,
        audio_asset_id: req.audio_asset_id,
    };
    accept_job(
        &pool,
        &ctx,
        auth.user_id,
        title,
        JobType::VideoGeneration,
        serde_json::to_value(&params)?,
    )
    .await
}

/// Validate a voice sample for cloning.
#[utoipa::path(
    post,
    path = "/api/generate/voice-clone",
    tag = "Generate",
    request_body = VoiceCloneRequest,
    responses(
        (status = 202, description = "Voice-clone job accepted", body = JobAcceptedResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Voice asset not found")
    ),
    security(("bearer_auth" = []))
)]
#[post("/voice-clone")]
pub async fn generate_voice_clone(
    pool: web::Data<DbPool>,
    ctx: web::Data<PipelineContext>,
    auth: AuthUser,
    body: web::Json<VoiceCloneRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let title = job_title(req.title, "Voice clone validation")?;
    ensure_assets_owned(&pool, auth.user_id, &[req.voice_asset_id]).await?;

    let params = VoiceCloneParams {
        voice_asset_id: req.voice_asset_id,
    };
    accept_job(
        &pool,
        &ctx,
        auth.user_id,
        title,
        JobType::VoiceClone,
        serde_json::to_value(&params)?,
    )
    .await
}

/// Run the full script -> speech -> video pipeline.
#[utoipa::path(
    post,
    path = "/api/generate/full",
    tag = "Generate",
    request_body = FullPipelineRequest,
    responses(
        (status = 202, description = "Pipeline job accepted", body = JobAcceptedResponse),
        (status = 400, description = "Neither topic nor script_text provided"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Voice or portrait asset not found")
    ),
    security(("bearer_auth" = []))
)]
#[post("/full")]
pub async fn generate_full(
    pool: web::Data<DbPool>,
    ctx: web::Data<PipelineContext>,
    auth: AuthUser,
    body: web::Json<FullPipelineRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();

    let has_topic = req.topic.as_deref().is_some_and(|t| !t.trim().is_empty());
    let has_script = req
        .script_text
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty());
    if !has_topic && !has_script {
        return Err(AppError::InvalidInput(
            "Either topic or script_text must be provided".to_string(),
        ));
    }

    let title = job_title(req.title, "Full lecture pipeline")?;
    ensure_assets_owned(
        &pool,
        auth.user_id,
        &[req.voice_asset_id, req.portrait_asset_id],
    )
    .await?;

    let params = FullPipelineParams {
        topic: req.topic,
        script_text: req.script_text,
        voice_asset_id: req.voice_asset_id,
        portrait_asset_id: req.portrait_asset_id,
        target_audience: req.target_audience,
        duration_minutes: req.duration_minutes,
        style: req.style,
        additional_context: req.additional_context,
    };
    accept_job(
        &pool,
        &ctx,
        auth.user_id,
        title,
        JobType::FullPipeline,
        serde_json::to_value(&params)?,
    )
    .await
}

/// Aggregated health of the hosted AI services.
///
/// Results are cached for five minutes so dashboards can poll freely without
/// hammering the external spaces.
#[utoipa::path(
    get,
    path = "/api/generate/health",
    tag = "Generate",
    responses(
        (status = 200, description = "Per-service health", body = crate::services::ai::ServicesHealth)
    )
)]
#[get("/health")]
pub async fn services_health(ai: web::Data<AiClients>) -> AppResult<HttpResponse> {
    let health = ai.health().await;
    Ok(HttpResponse::Ok().json(health))
}
