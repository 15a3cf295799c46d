//! Export endpoints for generated videos.

use actix_web::{get, post, web, HttpResponse};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{AssetStatus, AssetType};
use crate::services::Storage;

/// Presigned URL validity for exports.
const EXPORT_EXPIRES_SECS: u64 = 3600;

/// Response for a video export.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExportVideoResponse {
    pub download_url: String,
    pub filename: String,
    pub expires_in: u64,
}

/// Configure export routes under /api/export.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/export")
            .service(export_video)
            .service(export_scorm),
    );
}

/// Export a generated video in the requested container format.
///
/// Videos are stored as mp4 and served as-is; transcoding to other formats
/// is not offered.
#[utoipa::path(
    get,
    path = "/api/export/video/{asset_id}/{format}",
    tag = "Export",
    params(
        ("asset_id" = Uuid, Path, description = "Generated video asset id"),
        ("format" = String, Path, description = "Container format, only mp4 is supported")
    ),
    responses(
        (status = 200, description = "Presigned download link", body = ExportVideoResponse),
        (status = 400, description = "Unsupported format or video not ready"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Asset not found")
    ),
    security(("bearer_auth" = []))
)]
#[get("/video/{asset_id}/{format}")]
pub async fn export_video(
    pool: web::Data<DbPool>,
    storage: web::Data<Storage>,
    auth: AuthUser,
    path: web::Path<(Uuid, String)>,
) -> AppResult<HttpResponse> {
    let (asset_id, format) = path.into_inner();

    if !format.eq_ignore_ascii_case("mp4") {
        return Err(AppError::InvalidInput(format!(
            "Unsupported export format '{}'. Only mp4 is available.",
            format
        )));
    }

    let asset = pool
        .get_asset_for_user(asset_id, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Asset {}", asset_id)))?;

    if asset.asset_type != AssetType::GeneratedVideo.as_str() {
        return Err(AppError::InvalidInput(format!(
            "Asset {} is not a generated video",
            asset_id
        )));
    }
    if asset.status != AssetStatus::Ready.as_str() {
        return Err(AppError::InvalidInput(format!(
            "Asset {} is not ready for export (status: {})",
            asset_id, asset.status
        )));
    }

    let download_url = storage
        .presigned_get(&asset.storage_path, EXPORT_EXPIRES_SECS)
        .await?;

    Ok(HttpResponse::Ok().json(ExportVideoResponse {
        download_url,
        filename: asset.original_filename,
        expires_in: EXPORT_EXPIRES_SECS,
    }))
}

/// Export a video as a SCORM package.
#[utoipa::path(
    post,
    path = "/api/export/scorm/{asset_id}",
    tag = "Export",
    params(("asset_id" = Uuid, Path, description = "Generated video asset id")),
    responses(
        (status = 501, description = "SCORM packaging is not implemented"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
#[post("/scorm/{asset_id}")]
pub async fn export_scorm(_auth: AuthUser, _path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    Err(AppError::NotImplemented("SCORM export".to_string()))
}
