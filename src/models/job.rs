//! Job domain models, typed per-job-type parameters/results, and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

/// Job type enum. Selects the background task and the parameter/result schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// LLM lecture script generation.
    ScriptGeneration,
    /// Voice-cloned speech synthesis.
    TextToSpeech,
    /// Talking-head video compositing.
    VideoGeneration,
    /// Script -> speech -> video composite.
    FullPipeline,
    /// Voice sample validation.
    VoiceClone,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScriptGeneration => "script_generation",
            Self::TextToSpeech => "text_to_speech",
            Self::VideoGeneration => "video_generation",
            Self::FullPipeline => "full_pipeline",
            Self::VoiceClone => "voice_clone",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "script_generation" => Some(Self::ScriptGeneration),
            "text_to_speech" => Some(Self::TextToSpeech),
            "video_generation" => Some(Self::VideoGeneration),
            "full_pipeline" => Some(Self::FullPipeline),
            "voice_clone" => Some(Self::VoiceClone),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job status enum.
///
/// Transitions: pending -> processing -> completed|failed, and
/// pending|processing -> cancelled. Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, waiting for a task to claim it.
    Pending,
    /// Claimed by a background task.
    Processing,
    /// Finished successfully, results recorded.
    Completed,
    /// Task hit an error, error_info recorded.
    Failed,
    /// Cancelled by the user.
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Completed, failed, and cancelled jobs never change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job priority enum. Informational ordering hint, no scheduler semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl JobPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a single job step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Typed job parameters (jobs.parameters JSONB, dispatched by job_type)
// ============================================================================

/// Parameters for script generation jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScriptGenerationParams {
    /// Lecture topic.
    pub topic: String,
    /// Defaults to "college students".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    /// Target length in minutes, defaults to 15.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    /// Defaults to "engaging and educational".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    /// Full prompt override. When set, the other fields are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Parameters for text-to-speech jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TextToSpeechParams {
    /// Text to synthesize.
    pub text: String,
    /// Voice sample asset to clone from.
    pub voice_asset_id: Uuid,
}

/// Parameters for video generation jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VideoGenerationParams {
    /// Portrait image asset.
    pub portrait_asset_id: Uuid,
    /// Driving audio asset (voice sample or generated audio).
    pub audio_asset_id: Uuid,
}

/// Parameters for voice-clone validation jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VoiceCloneParams {
    /// Voice sample asset to validate.
    pub voice_asset_id: Uuid,
}

/// Parameters for the full script -> speech -> video pipeline.
///
/// Either `topic` (script gets generated) or `script_text` (script stage is
/// skipped) must be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FullPipelineParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_text: Option<String>,
    pub voice_asset_id: Uuid,
    pub portrait_asset_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

/// Per-job-type parameters, dispatched by the `job_type` column.
///
/// The JSONB column stores the inner struct only; the tag lives in `job_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobParams {
    ScriptGeneration(ScriptGenerationParams),
    TextToSpeech(TextToSpeechParams),
    VideoGeneration(VideoGenerationParams),
    FullPipeline(FullPipelineParams),
    VoiceClone(VoiceCloneParams),
}

impl JobParams {
    /// Parse a raw JSON payload against the schema for `job_type`.
    pub fn parse(job_type: JobType, value: &JsonValue) -> Result<Self, String> {
        let parsed = match job_type {
            JobType::ScriptGeneration => serde_json::from_value::<ScriptGenerationParams>(
                value.clone(),
            )
            .map(JobParams::ScriptGeneration),
            JobType::TextToSpeech => {
                serde_json::from_value::<TextToSpeechParams>(value.clone())
                    .map(JobParams::TextToSpeech)
            }
            JobType::VideoGeneration => {
                serde_json::from_value::<VideoGenerationParams>(value.clone())
                    .map(JobParams::VideoGeneration)
            }
            JobType::FullPipeline => {
                serde_json::from_value::<FullPipelineParams>(value.clone())
                    .map(JobParams::FullPipeline)
            }
            JobType::VoiceClone => {
                serde_json::from_value::<VoiceCloneParams>(value.clone())
                    .map(JobParams::VoiceClone)
            }
        }
        .map_err(|e| format!("Invalid parameters for {}: {}", job_type, e))?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Cross-field validation beyond what serde checks.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            JobParams::ScriptGeneration(p) => {
                if p.topic.trim().is_empty() && p.prompt.is_none() {
                    return Err("topic or prompt is required".to_string());
                }
            }
            JobParams::TextToSpeech(p) => {
                if p.text.trim().is_empty() {
                    return Err("text must not be empty".to_string());
                }
            }
            JobParams::FullPipeline(p) => {
                let has_topic = p.topic.as_deref().is_some_and(|t| !t.trim().is_empty());
                let has_script = p
                    .script_text
                    .as_deref()
                    .is_some_and(|t| !t.trim().is_empty());
                if !has_topic && !has_script {
                    return Err("either topic or script_text is required".to_string());
                }
            }
            JobParams::VideoGeneration(_) | JobParams::VoiceClone(_) => {}
        }
        Ok(())
    }

    /// Asset ids this job reads as inputs (ownership-checked before creation).
    pub fn input_asset_ids(&self) -> Vec<Uuid> {
        match self {
            JobParams::ScriptGeneration(_) => vec![],
            JobParams::TextToSpeech(p) => vec![p.voice_asset_id],
            JobParams::VideoGeneration(p) => vec![p.portrait_asset_id, p.audio_asset_id],
            JobParams::FullPipeline(p) => vec![p.voice_asset_id, p.portrait_asset_id],
            JobParams::VoiceClone(p) => vec![p.voice_asset_id],
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            JobParams::ScriptGeneration(p) => serde_json::to_value(p),
            JobParams::TextToSpeech(p) => serde_json::to_value(p),
            JobParams::VideoGeneration(p) => serde_json::to_value(p),
            JobParams::FullPipeline(p) => serde_json::to_value(p),
            JobParams::VoiceClone(p) => serde_json::to_value(p),
        }
        .unwrap_or(JsonValue::Null)
    }
}

// ============================================================================
// Typed job results (jobs.results JSONB)
// ============================================================================

/// Word/sentence statistics computed over a generated script.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScriptAnalysis {
    pub word_count: usize,
    pub sentence_count: usize,
    pub paragraph_count: usize,
    pub character_count: usize,
    /// At 150 spoken words per minute.
    pub estimated_duration_minutes: f64,
}

/// Results of a script generation job.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScriptGenerationResults {
    pub script_asset_id: Uuid,
    /// First 500 characters of the script.
    pub script_preview: String,
    pub analysis: ScriptAnalysis,
}

/// Results of a text-to-speech job.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TextToSpeechResults {
    pub audio_asset_id: Uuid,
    pub storage_path: String,
    pub file_size: u64,
    pub text_length: usize,
}

/// Results of a video generation job.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VideoGenerationResults {
    pub video_asset_id: Uuid,
    pub storage_path: String,
    pub file_size: u64,
}

/// Results of a voice-clone validation job.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VoiceCloneResults {
    pub voice_asset_id: Uuid,
    pub file_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
}

/// Results of a full pipeline job.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FullPipelineResults {
    /// Absent when the caller supplied script_text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_asset_id: Option<Uuid>,
    pub audio_asset_id: Uuid,
    pub video_asset_id: Uuid,
}

// ============================================================================
// Pipeline saga checkpoints (jobs.checkpoint JSONB)
// ============================================================================

/// Stages of the full generation pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Script,
    Speech,
    Video,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Speech => "speech",
            Self::Video => "video",
        }
    }

    /// All stages in execution order.
    pub const ORDER: [PipelineStage; 3] = [Self::Script, Self::Speech, Self::Video];
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Committed marker for one completed pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StageCheckpoint {
    pub stage: PipelineStage,
    /// Asset produced by the stage.
    pub asset_id: Uuid,
    pub storage_path: String,
    pub completed_at: DateTime<Utc>,
}

/// Saga state persisted after every completed stage. Resume skips any stage
/// that already has a committed checkpoint and reuses its artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PipelineCheckpoint {
    pub stages: Vec<StageCheckpoint>,
}

impl PipelineCheckpoint {
    pub fn from_json(value: Option<&JsonValue>) -> Self {
        value
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }

    pub fn get(&self, stage: PipelineStage) -> Option<&StageCheckpoint> {
        self.stages.iter().find(|c| c.stage == stage)
    }

    /// Record a completed stage, replacing any stale marker for it.
    pub fn record(&mut self, checkpoint: StageCheckpoint) {
        self.stages.retain(|c| c.stage != checkpoint.stage);
        self.stages.push(checkpoint);
    }
}

/// Model info captured from a service client, keyed by service name
/// ("llm" | "tts" | "video") in jobs.service_metadata.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceModelInfo {
    pub model_name: String,
    pub model_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

// ============================================================================
// Request / response DTOs
// ============================================================================

/// Request to create a job.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateJobRequest {
    /// 1-200 characters.
    pub title: String,
    /// Up to 1000 characters.
    #[serde(default)]
    pub description: Option<String>,
    pub job_type: JobType,
    /// Defaults to normal.
    #[serde(default)]
    pub priority: Option<JobPriority>,
    /// Payload matching the job_type's parameter schema.
    pub parameters: JsonValue,
    /// Extra asset references to ownership-check beyond the parameters.
    #[serde(default)]
    pub asset_ids: Option<Vec<Uuid>>,
    /// Estimated duration in seconds (>= 1).
    #[serde(default)]
    pub estimated_duration: Option<i32>,
}

/// Request to update a non-terminal job.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateJobRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<JobPriority>,
    #[serde(default)]
    pub parameters: Option<JsonValue>,
}

/// External progress update (worker hook).
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProgressUpdateRequest {
    /// 0-100.
    pub progress_percentage: i32,
    /// Up to 500 characters.
    #[serde(default)]
    pub message: Option<String>,
}

/// Request to append a job step.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateStepRequest {
    /// 1-100 characters.
    pub name: String,
    /// Up to 500 characters.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub step_order: Option<i32>,
    #[serde(default)]
    pub estimated_duration: Option<i32>,
    #[serde(default)]
    pub input_data: Option<JsonValue>,
}

/// Public job representation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobResponse {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: JobPriority,
    pub progress_percentage: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    pub parameters: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_info: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_metadata: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<i32>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Present on detail responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<JobStepResponse>>,
}

impl From<crate::entity::job::Model> for JobResponse {
    fn from(m: crate::entity::job::Model) -> Self {
        let job_type = JobType::parse(&m.job_type).unwrap_or(JobType::ScriptGeneration);
        let status = JobStatus::parse(&m.status).unwrap_or(JobStatus::Failed);
        let priority = JobPriority::parse(&m.priority).unwrap_or(JobPriority::Normal);
        JobResponse {
            id: m.id,
            title: m.title,
            description: m.description,
            job_type,
            status,
            priority,
            progress_percentage: m.progress_percentage,
            progress_message: m.progress_message,
            parameters: m.parameters,
            results: m.results,
            error_info: m.error_info,
            service_metadata: m.service_metadata,
            task_id: m.task_id,
            user_id: m.user_id,
            estimated_duration: m.estimated_duration,
            created_at: m.created_at,
            started_at: m.started_at,
            completed_at: m.completed_at,
            steps: None,
        }
    }
}

/// Public job step representation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobStepResponse {
    pub id: Uuid,
    pub job_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub step_order: i32,
    pub status: StepStatus,
    pub progress_percentage: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_info: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<crate::entity::job_step::Model> for JobStepResponse {
    fn from(m: crate::entity::job_step::Model) -> Self {
        let status = StepStatus::parse(&m.status).unwrap_or(StepStatus::Failed);
        JobStepResponse {
            id: m.id,
            job_id: m.job_id,
            name: m.name,
            description: m.description,
            step_order: m.step_order,
            status,
            progress_percentage: m.progress_percentage,
            input_data: m.input_data,
            output_data: m.output_data,
            error_info: m.error_info,
            started_at: m.started_at,
            completed_at: m.completed_at,
            created_at: m.created_at,
        }
    }
}

/// Minimal polling payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobPollResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress_percentage: i32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<JsonValue>,
}

/// Job list response with pagination.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
    pub pagination: super::Pagination,
}

/// Query parameters for listing jobs.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ListJobsQuery {
    #[serde(default)]
    pub job_type: Option<JobType>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub priority: Option<JobPriority>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub per_page: Option<u64>,
}

/// Response for generation trigger endpoints (202 Accepted).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobAcceptedResponse {
    pub job_id: Uuid,
    pub task_id: Uuid,
    pub status: JobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_type_round_trip() {
        for t in [
            JobType::ScriptGeneration,
            JobType::TextToSpeech,
            JobType::VideoGeneration,
            JobType::FullPipeline,
            JobType::VoiceClone,
        ] {
            assert_eq!(JobType::parse(t.as_str()), Some(t));
        }
        assert_eq!(JobType::parse("subtitling"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_parse_tts_params() {
        let id = Uuid::now_v7();
        let value = json!({"text": "Hello class", "voice_asset_id": id});
        let params = JobParams::parse(JobType::TextToSpeech, &value).unwrap();
        assert_eq!(params.input_asset_ids(), vec![id]);
    }

    #[test]
    fn test_parse_rejects_wrong_shape_for_type() {
        // A TTS payload is not a valid video payload
        let value = json!({"text": "Hello", "voice_asset_id": Uuid::now_v7()});
        assert!(JobParams::parse(JobType::VideoGeneration, &value).is_err());
    }

    #[test]
    fn test_parse_rejects_empty_tts_text() {
        let value = json!({"text": "   ", "voice_asset_id": Uuid::now_v7()});
        assert!(JobParams::parse(JobType::TextToSpeech, &value).is_err());
    }

    #[test]
    fn test_full_pipeline_requires_topic_or_script() {
        let voice = Uuid::now_v7();
        let portrait = Uuid::now_v7();

        let neither = json!({"voice_asset_id": voice, "portrait_asset_id": portrait});
        assert!(JobParams::parse(JobType::FullPipeline, &neither).is_err());

        let with_topic = json!({
            "topic": "Thermodynamics",
            "voice_asset_id": voice,
            "portrait_asset_id": portrait,
        });
        let params = JobParams::parse(JobType::FullPipeline, &with_topic).unwrap();
        assert_eq!(params.input_asset_ids(), vec![voice, portrait]);

        let with_script = json!({
            "script_text": "Welcome to today's lecture.",
            "voice_asset_id": voice,
            "portrait_asset_id": portrait,
        });
        assert!(JobParams::parse(JobType::FullPipeline, &with_script).is_ok());
    }

    #[test]
    fn test_params_round_trip_through_json() {
        let original = JobParams::TextToSpeech(TextToSpeechParams {
            text: "Good morning".to_string(),
            voice_asset_id: Uuid::now_v7(),
        });
        let json = original.to_json();
        let parsed = JobParams::parse(JobType::TextToSpeech, &json).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_checkpoint_record_and_lookup() {
        let mut checkpoint = PipelineCheckpoint::default();
        assert!(checkpoint.get(PipelineStage::Script).is_none());

        let asset_id = Uuid::now_v7();
        checkpoint.record(StageCheckpoint {
            stage: PipelineStage::Script,
            asset_id,
            storage_path: "generated/scripts/x/script.txt".to_string(),
            completed_at: Utc::now(),
        });

        assert_eq!(
            checkpoint.get(PipelineStage::Script).map(|c| c.asset_id),
            Some(asset_id)
        );
        assert!(checkpoint.get(PipelineStage::Speech).is_none());

        // Re-recording a stage replaces the old marker
        let newer = Uuid::now_v7();
        checkpoint.record(StageCheckpoint {
            stage: PipelineStage::Script,
            asset_id: newer,
            storage_path: "generated/scripts/x/script.txt".to_string(),
            completed_at: Utc::now(),
        });
        assert_eq!(checkpoint.stages.len(), 1);
        assert_eq!(
            checkpoint.get(PipelineStage::Script).map(|c| c.asset_id),
            Some(newer)
        );
    }

    #[test]
    fn test_checkpoint_survives_json_round_trip() {
        let mut checkpoint = PipelineCheckpoint::default();
        checkpoint.record(StageCheckpoint {
            stage: PipelineStage::Speech,
            asset_id: Uuid::now_v7(),
            storage_path: "generated/audio/x/speech.wav".to_string(),
            completed_at: Utc::now(),
        });

        let json = checkpoint.to_json();
        let restored = PipelineCheckpoint::from_json(Some(&json));
        assert!(restored.get(PipelineStage::Speech).is_some());

        // Missing/garbage checkpoint columns read as empty
        assert!(PipelineCheckpoint::from_json(None).stages.is_empty());
    }
}
