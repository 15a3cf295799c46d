//! Domain models for the voice lecturer server.

use utoipa::ToSchema;

pub mod asset;
pub mod event;
pub mod job;
pub mod user;

// Re-export commonly used types
pub use asset::{
    AssetDownloadResponse, AssetListResponse, AssetResponse, AssetStatus, AssetType,
    DeleteAssetResponse, ListAssetsQuery, PresignedUploadHeaders, PresignedUploadRequest,
    PresignedUploadResponse, UploadAssetResponse,
};
pub use event::{JobEvent, JobEventMessage};
pub use job::{
    CreateJobRequest, CreateStepRequest, FullPipelineParams, FullPipelineResults,
    JobAcceptedResponse, JobListResponse, JobParams, JobPollResponse, JobPriority, JobResponse,
    JobStatus, JobStepResponse, JobType, ListJobsQuery, PipelineCheckpoint, PipelineStage,
    ProgressUpdateRequest, ScriptAnalysis, ScriptGenerationParams, ScriptGenerationResults,
    ServiceModelInfo, StageCheckpoint, StepStatus, TextToSpeechParams, TextToSpeechResults,
    UpdateJobRequest, VideoGenerationParams, VideoGenerationResults, VoiceCloneParams,
    VoiceCloneResults,
};
pub use user::{
    AccessTokenResponse, ChangePasswordRequest, LoginRequest, RefreshRequest, RegisterRequest,
    SessionClaims, TokenPairResponse, UpdateProfileRequest, UserResponse, UserRole,
    VerifyTokenResponse,
};

/// Default page size for list endpoints.
const DEFAULT_PER_PAGE: u64 = 20;

/// Maximum page size for list endpoints.
const MAX_PER_PAGE: u64 = 100;

/// Pagination parameters.
#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl PaginationParams {
    pub fn new(page: Option<u64>, per_page: Option<u64>) -> Self {
        Self { page, per_page }
    }

    /// Current page, 1-based.
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Clamp per_page to maximum allowed value.
    pub fn clamped_per_page(&self) -> u64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    /// Calculate the offset for database queries.
    pub fn offset(&self) -> u64 {
        (self.page() - 1) * self.clamped_per_page()
    }
}

/// Pagination metadata for responses.
#[derive(Debug, Clone, serde::Serialize, ToSchema)]
pub struct Pagination {
    pub page: u64,
    pub pages: u64,
    pub per_page: u64,
    pub total: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    /// Create pagination metadata.
    pub fn new(page: u64, per_page: u64, total: u64) -> Self {
        let pages = if total == 0 {
            0
        } else {
            total.div_ceil(per_page)
        };

        Pagination {
            page,
            pages,
            per_page,
            total,
            has_next: page < pages,
            has_prev: page > 1 && total > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_params_defaults() {
        let params = PaginationParams::new(None, None);
        assert_eq!(params.page(), 1);
        assert_eq!(params.clamped_per_page(), 20);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_pagination_params_clamping() {
        let params = PaginationParams::new(Some(3), Some(500));
        assert_eq!(params.clamped_per_page(), 100);
        assert_eq!(params.offset(), 200);

        let zero = PaginationParams::new(Some(0), Some(0));
        assert_eq!(zero.page(), 1);
        assert_eq!(zero.clamped_per_page(), 1);
    }

    #[test]
    fn test_pagination_metadata() {
        let p = Pagination::new(2, 20, 45);
        assert_eq!(p.pages, 3);
        assert!(p.has_next);
        assert!(p.has_prev);

        let last = Pagination::new(3, 20, 45);
        assert!(!last.has_next);

        let empty = Pagination::new(1, 20, 0);
        assert_eq!(empty.pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_prev);
    }
}
