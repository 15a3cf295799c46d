//! Asset domain models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

/// Asset type enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    /// Portrait image that drives the talking head.
    Portrait,
    /// Reference voice recording for cloning.
    VoiceSample,
    /// Lecture script text.
    Script,
    /// Pipeline-produced speech audio.
    GeneratedAudio,
    /// Pipeline-produced talking-head video.
    GeneratedVideo,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Portrait => "portrait",
            Self::VoiceSample => "voice_sample",
            Self::Script => "script",
            Self::GeneratedAudio => "generated_audio",
            Self::GeneratedVideo => "generated_video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "portrait" => Some(Self::Portrait),
            "voice_sample" => Some(Self::VoiceSample),
            "script" => Some(Self::Script),
            "generated_audio" => Some(Self::GeneratedAudio),
            "generated_video" => Some(Self::GeneratedVideo),
            _ => None,
        }
    }

    /// Whether assets of this type are rendered inline in the UI (presigned preview URL).
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Portrait)
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Asset lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    /// Row created, bytes not yet confirmed in storage.
    Uploading,
    /// A pipeline stage is producing this asset.
    Processing,
    /// Stored object is retrievable.
    Ready,
    /// Upload or generation failed.
    Error,
    /// Soft-deleted.
    Deleted,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploading" => Some(Self::Uploading),
            "processing" => Some(Self::Processing),
            "ready" => Some(Self::Ready),
            "error" => Some(Self::Error),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Public asset representation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AssetResponse {
    pub id: Uuid,
    pub filename: String,
    pub original_filename: String,
    pub asset_type: AssetType,
    pub status: AssetStatus,
    pub storage_path: String,
    pub storage_bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Presigned GET URL, present for ready assets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Presigned inline preview URL, present for ready images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

impl From<crate::entity::asset::Model> for AssetResponse {
    fn from(m: crate::entity::asset::Model) -> Self {
        let asset_type = AssetType::parse(&m.asset_type).unwrap_or(AssetType::Script);
        let status = AssetStatus::parse(&m.status).unwrap_or(AssetStatus::Error);
        AssetResponse {
            id: m.id,
            filename: m.filename,
            original_filename: m.original_filename,
            asset_type,
            status,
            storage_path: m.storage_path,
            storage_bucket: m.storage_bucket,
            file_size: m.file_size,
            mime_type: m.mime_type,
            file_extension: m.file_extension,
            metadata: m.metadata,
            user_id: m.user_id,
            created_at: m.created_at,
            updated_at: m.updated_at,
            download_url: None,
            preview_url: None,
        }
    }
}

/// Query parameters for listing assets.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ListAssetsQuery {
    #[serde(default)]
    pub asset_type: Option<AssetType>,
    #[serde(default)]
    pub status: Option<AssetStatus>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub per_page: Option<u64>,
}

/// Asset list response with pagination.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AssetListResponse {
    pub assets: Vec<AssetResponse>,
    pub pagination: super::Pagination,
}

/// Request for a presigned direct-to-storage upload.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PresignedUploadRequest {
    pub filename: String,
    pub asset_type: AssetType,
    pub file_size: i64,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Presigned upload response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PresignedUploadResponse {
    pub upload_url: String,
    pub asset_id: Uuid,
    /// URL validity in seconds.
    pub expires_in: u64,
    pub method: String,
    pub headers: PresignedUploadHeaders,
}

/// Headers the client must send with the presigned PUT.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PresignedUploadHeaders {
    #[serde(rename = "Content-Type")]
    pub content_type: String,
}

/// Response after a completed upload.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadAssetResponse {
    pub message: String,
    pub asset: AssetResponse,
}

/// Presigned download response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AssetDownloadResponse {
    pub download_url: String,
    pub filename: String,
    pub expires_in: u64,
}

/// Response after deleting an asset.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeleteAssetResponse {
    pub message: String,
    pub asset_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_type_round_trip() {
        for t in [
            AssetType::Portrait,
            AssetType::VoiceSample,
            AssetType::Script,
            AssetType::GeneratedAudio,
            AssetType::GeneratedVideo,
        ] {
            assert_eq!(AssetType::parse(t.as_str()), Some(t));
        }
        assert_eq!(AssetType::parse("hologram"), None);
    }

    #[test]
    fn test_asset_status_round_trip() {
        for s in [
            AssetStatus::Uploading,
            AssetStatus::Processing,
            AssetStatus::Ready,
            AssetStatus::Error,
            AssetStatus::Deleted,
        ] {
            assert_eq!(AssetStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn test_only_portraits_preview_as_images() {
        assert!(AssetType::Portrait.is_image());
        assert!(!AssetType::VoiceSample.is_image());
        assert!(!AssetType::GeneratedVideo.is_image());
    }
}
