//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::{api, error, models, services};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Voice Lecturer Server",
        version = "0.3.0",
        description = "Backend for voice-cloned talking-head lecture generation: asset management, job orchestration, and hosted AI service integration"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Health endpoints
        api::health::health,
        api::health::ready,
        // Auth endpoints
        api::auth::register,
        api::auth::login,
        api::auth::refresh,
        api::auth::logout,
        api::auth::get_profile,
        api::auth::update_profile,
        api::auth::change_password,
        api::auth::verify_token,
        // Asset endpoints
        api::assets::list_assets,
        api::assets::upload_asset,
        api::assets::presigned_upload,
        api::assets::confirm_upload,
        api::assets::get_asset,
        api::assets::download_asset,
        api::assets::delete_asset,
        // Job endpoints
        api::jobs::list_jobs,
        api::jobs::create_job,
        api::jobs::get_job,
        api::jobs::update_job,
        api::jobs::cancel_job,
        api::jobs::update_progress,
        api::jobs::list_steps,
        api::jobs::create_step,
        api::jobs::poll_job,
        api::jobs::delete_job,
        // Generation triggers
        api::generate::generate_script,
        api::generate::generate_speech,
        api::generate::generate_video,
        api::generate::generate_voice_clone,
        api::generate::generate_full,
        api::generate::services_health,
        // Export endpoints
        api::export::export_video,
        api::export::export_scorm,
        // Worker endpoints
        api::worker::ping,
        api::worker::status,
        api::worker::task_state,
        // Analytics
        api::analytics::dashboard,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            models::Pagination,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            // Auth
            models::UserRole,
            models::RegisterRequest,
            models::LoginRequest,
            models::RefreshRequest,
            models::UpdateProfileRequest,
            models::ChangePasswordRequest,
            models::UserResponse,
            models::TokenPairResponse,
            models::AccessTokenResponse,
            models::VerifyTokenResponse,
            api::auth::MessageResponse,
            // Assets
            models::AssetType,
            models::AssetStatus,
            models::AssetResponse,
            models::AssetListResponse,
            models::AssetDownloadResponse,
            models::UploadAssetResponse,
            models::DeleteAssetResponse,
            models::PresignedUploadRequest,
            models::PresignedUploadResponse,
            models::PresignedUploadHeaders,
            models::ListAssetsQuery,
            // Jobs
            models::JobType,
            models::JobStatus,
            models::JobPriority,
            models::StepStatus,
            models::CreateJobRequest,
            models::UpdateJobRequest,
            models::CreateStepRequest,
            models::ProgressUpdateRequest,
            models::ListJobsQuery,
            models::JobResponse,
            models::JobStepResponse,
            models::JobListResponse,
            models::JobPollResponse,
            models::JobAcceptedResponse,
            api::jobs::DeleteJobResponse,
            api::jobs::StepListResponse,
            // Job parameters and results
            models::ScriptGenerationParams,
            models::TextToSpeechParams,
            models::VideoGenerationParams,
            models::VoiceCloneParams,
            models::FullPipelineParams,
            models::ScriptGenerationResults,
            models::TextToSpeechResults,
            models::VideoGenerationResults,
            models::VoiceCloneResults,
            models::FullPipelineResults,
            models::ScriptAnalysis,
            models::ServiceModelInfo,
            // Generation triggers
            api::generate::GenerateScriptRequest,
            api::generate::GenerateSpeechRequest,
            api::generate::GenerateVideoRequest,
            api::generate::VoiceCloneRequest,
            api::generate::FullPipelineRequest,
            // Service health
            services::ai::HealthStatus,
            services::ai::OverallHealth,
            services::ai::ServiceHealth,
            services::ai::ServiceHealthMap,
            services::ai::ServicesHealth,
            // Export
            api::export::ExportVideoResponse,
            // Worker
            api::worker::WorkerPingResponse,
            api::worker::WorkerStatusResponse,
            // Analytics
            api::analytics::DashboardQuery,
            api::analytics::DashboardResponse,
            api::analytics::DashboardSummary,
            api::analytics::StatusBreakdown,
            api::analytics::JobPerformanceRow,
            api::analytics::DailyPerformance,
            api::analytics::RecentJobEntry,
            api::analytics::BenchmarkData,
            api::analytics::JobTypeBenchmark,
            api::analytics::ModelUsageSummary,
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Auth", description = "Registration, login, and profile management"),
        (name = "Assets", description = "Portrait, voice sample, and generated media management"),
        (name = "Jobs", description = "Job lifecycle and step tracking"),
        (name = "Generate", description = "Typed generation triggers"),
        (name = "Export", description = "Download packaging for generated videos"),
        (name = "Worker", description = "Task and connectivity introspection"),
        (name = "Analytics", description = "Job history dashboards")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Add the JWT bearer security scheme.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
