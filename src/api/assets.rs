//! Asset management endpoints: upload, listing, presigned access, deletion.

use actix_multipart::Multipart;
use actix_web::{delete, get, post, web, HttpResponse};
use futures_util::StreamExt;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::assets::NewAsset;
use crate::db::DbPool;
use crate::entity::asset;
use crate::error::{AppError, AppResult};
use crate::models::{
    AssetDownloadResponse, AssetListResponse, AssetResponse, AssetStatus, AssetType,
    DeleteAssetResponse, ListAssetsQuery, Pagination, PaginationParams, PresignedUploadHeaders,
    PresignedUploadRequest, PresignedUploadResponse, UploadAssetResponse,
};
use crate::services::Storage;

/// Presigned URL validity for downloads and direct uploads.
const PRESIGN_EXPIRES_SECS: u64 = 3600;

const MIB: i64 = 1024 * 1024;

/// Configure asset routes under /api/assets.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/assets")
            .service(list_assets)
            .service(upload_asset)
            .service(presigned_upload)
            .service(confirm_upload)
            .service(download_asset)
            .service(delete_asset)
            .service(get_asset),
    );
}

/// Extensions accepted per uploadable asset type. Generated types are
/// pipeline outputs and cannot be uploaded.
fn allowed_extensions(asset_type: AssetType) -> Option<&'static [&'static str]> {
    match asset_type {
        AssetType::Portrait => Some(&["jpg", "jpeg", "png", "gif", "bmp", "webp"]),
        AssetType::VoiceSample => Some(&["mp3", "wav", "flac", "aac", "ogg", "m4a"]),
        AssetType::Script => Some(&["txt", "md", "json"]),
        AssetType::GeneratedAudio | AssetType::GeneratedVideo => None,
    }
}

/// Per-type upload size cap in bytes.
fn max_upload_bytes(asset_type: AssetType) -> i64 {
    match asset_type {
        AssetType::Portrait => 10 * MIB,
        AssetType::VoiceSample => 50 * MIB,
        AssetType::Script => MIB,
        AssetType::GeneratedAudio | AssetType::GeneratedVideo => 0,
    }
}

/// Validate filename and size for an upload; returns the lowercase extension.
fn validate_upload(asset_type: AssetType, filename: &str, size: i64) -> AppResult<String> {
    let Some(allowed) = allowed_extensions(asset_type) else {
        return Err(AppError::InvalidInput(format!(
            "Assets of type {} are generated by jobs and cannot be uploaded",
            asset_type
        )));
    };

    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    if !allowed.contains(&ext.as_str()) {
        return Err(AppError::InvalidInput(format!(
            "File extension '{}' is not allowed for {} (allowed: {})",
            ext,
            asset_type,
            allowed.join(", ")
        )));
    }

    let cap = max_upload_bytes(asset_type);
    if size <= 0 {
        return Err(AppError::InvalidInput("File is empty".to_string()));
    }
    if size > cap {
        return Err(AppError::InvalidInput(format!(
            "File exceeds the {} MiB limit for {}",
            cap / MIB,
            asset_type
        )));
    }

    Ok(ext)
}

/// Attach presigned URLs to a ready asset's response.
async fn with_urls(storage: &Storage, model: asset::Model) -> AssetResponse {
    let ready = model.status == AssetStatus::Ready.as_str();
    let key = model.storage_path.clone();
    let is_image = AssetType::parse(&model.asset_type).is_some_and(|t| t.is_image());

    let mut response = AssetResponse::from(model);
    if ready {
        match storage.presigned_get(&key, PRESIGN_EXPIRES_SECS).await {
            Ok(url) => {
                if is_image {
                    response.preview_url = Some(url.clone());
                }
                response.download_url = Some(url);
            }
            Err(e) => warn!(key = %key, "Failed to presign download URL: {}", e),
        }
    }
    response
}

/// Fields parsed out of the upload form.
struct UploadForm {
    asset_type: Option<String>,
    description: Option<String>,
    filename: Option<String>,
    bytes: Vec<u8>,
}

async fn read_upload_form(mut payload: Multipart, max_bytes: usize) -> AppResult<UploadForm> {
    let mut form = UploadForm {
        asset_type: None,
        description: None,
        filename: None,
        bytes: Vec::new(),
    };

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::InvalidInput(format!("Multipart error: {}", e)))?;

        let content_disposition = field
            .content_disposition()
            .ok_or_else(|| AppError::InvalidInput("Missing content disposition".to_string()))?;
        let field_name = content_disposition.get_name().map(str::to_string);
        let filename = content_disposition.get_filename().map(str::to_string);

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| AppError::InvalidInput(format!("Read error: {}", e)))?;
            data.extend_from_slice(&chunk);

            if data.len() > max_bytes {
                return Err(AppError::InvalidInput(format!(
                    "Upload exceeds the {} byte request limit",
                    max_bytes
                )));
            }
        }

        match field_name.as_deref() {
            Some("file") => {
                form.filename = filename;
                form.bytes = data;
            }
            Some("asset_type") => {
                form.asset_type = Some(String::from_utf8_lossy(&data).trim().to_string());
            }
            Some("description") => {
                let text = String::from_utf8_lossy(&data).trim().to_string();
                if !text.is_empty() {
                    form.description = Some(text);
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// List the caller's assets.
#[utoipa::path(
    get,
    path = "/api/assets",
    tag = "Assets",
    security(("bearer_auth" = [])),
    params(
        ("asset_type" = Option<String>, Query, description = "Filter by asset type"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<u64>, Query, description = "Items per page (default: 20, max: 100)")
    ),
    responses(
        (status = 200, description = "List of assets", body = AssetListResponse)
    )
)]
#[get("")]
pub async fn list_assets(
    pool: web::Data<DbPool>,
    storage: web::Data<Storage>,
    auth: AuthUser,
    query: web::Query<ListAssetsQuery>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let pagination = PaginationParams::new(query.page, query.per_page);

    let (models, total) = pool
        .list_assets(auth.user_id, query.asset_type, query.status, &pagination)
        .await?;

    let mut assets = Vec::with_capacity(models.len());
    for model in models {
        assets.push(with_urls(&storage, model).await);
    }

    Ok(HttpResponse::Ok().json(AssetListResponse {
        assets,
        pagination: Pagination::new(pagination.page(), pagination.clamped_per_page(), total),
    }))
}

/// Upload an asset through the server.
///
/// Multipart form: `file` (required), `asset_type` (required), `description`.
#[utoipa::path(
    post,
    path = "/api/assets/upload",
    tag = "Assets",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Asset stored", body = UploadAssetResponse),
        (status = 400, description = "Validation failed", body = crate::error::ErrorResponse)
    )
)]
#[post("/upload")]
pub async fn upload_asset(
    pool: web::Data<DbPool>,
    storage: web::Data<Storage>,
    config: web::Data<Config>,
    auth: AuthUser,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let form = read_upload_form(payload, config.max_upload_size).await?;

    let type_str = form
        .asset_type
        .ok_or_else(|| AppError::InvalidInput("asset_type field is required".to_string()))?;
    let asset_type = AssetType::parse(&type_str)
        .ok_or_else(|| AppError::InvalidInput(format!("Unknown asset type: {}", type_str)))?;
    let original_filename = form
        .filename
        .ok_or_else(|| AppError::InvalidInput("file field is required".to_string()))?;

    let size = form.bytes.len() as i64;
    let ext = validate_upload(asset_type, &original_filename, size)?;

    let asset_id = Uuid::now_v7();
    let key = Storage::user_asset_key(auth.user_id, asset_type, asset_id, &ext);
    let content_type = Storage::content_type_for_extension(&ext);

    let metadata = form.description.as_ref().map(|d| json!({ "description": d }));
    let record = pool
        .insert_asset(NewAsset {
            id: asset_id,
            user_id: auth.user_id,
            filename: format!("{}.{}", asset_id, ext),
            original_filename: original_filename.clone(),
            asset_type,
            status: AssetStatus::Uploading,
            storage_path: key.clone(),
            storage_bucket: storage.bucket().to_string(),
            file_size: Some(size),
            mime_type: Some(content_type.to_string()),
            file_extension: Some(ext),
            metadata,
        })
        .await?;

    let etag = match storage.put(&key, form.bytes, Some(content_type)).await {
        Ok(etag) => etag,
        Err(e) => {
            if let Err(mark) = pool.mark_asset_error(record.id, &e.to_string()).await {
                warn!(asset_id = %record.id, "Failed to mark asset as errored: {}", mark);
            }
            return Err(e);
        }
    };

    if let Some(etag) = etag {
        let mut metadata = record.metadata.clone().unwrap_or_else(|| json!({}));
        if let Some(map) = metadata.as_object_mut() {
            map.insert("etag".to_string(), json!(etag));
        }
        pool.set_asset_metadata(record.id, metadata).await?;
    }

    let ready = pool.mark_asset_ready(record.id, Some(size)).await?;
    info!(
        asset_id = %ready.id,
        user_id = %auth.user_id,
        asset_type = %asset_type,
        size,
        "Asset uploaded"
    );

    let asset = with_urls(&storage, ready).await;
    Ok(HttpResponse::Created().json(UploadAssetResponse {
        message: "Asset uploaded successfully".to_string(),
        asset,
    }))
}

/// Request a presigned PUT for a direct-to-storage upload.
#[utoipa::path(
    post,
    path = "/api/assets/presigned-upload",
    tag = "Assets",
    security(("bearer_auth" = [])),
    request_body = PresignedUploadRequest,
    responses(
        (status = 200, description = "Presigned upload", body = PresignedUploadResponse),
        (status = 400, description = "Validation failed", body = crate::error::ErrorResponse)
    )
)]
#[post("/presigned-upload")]
pub async fn presigned_upload(
    pool: web::Data<DbPool>,
    storage: web::Data<Storage>,
    auth: AuthUser,
    body: web::Json<PresignedUploadRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let ext = validate_upload(req.asset_type, &req.filename, req.file_size)?;

    let asset_id = Uuid::now_v7();
    let key = Storage::user_asset_key(auth.user_id, req.asset_type, asset_id, &ext);
    let content_type = req
        .content_type
        .unwrap_or_else(|| Storage::content_type_for_extension(&ext).to_string());

    pool.insert_asset(NewAsset {
        id: asset_id,
        user_id: auth.user_id,
        filename: format!("{}.{}", asset_id, ext),
        original_filename: req.filename,
        asset_type: req.asset_type,
        status: AssetStatus::Uploading,
        storage_path: key.clone(),
        storage_bucket: storage.bucket().to_string(),
        file_size: Some(req.file_size),
        mime_type: Some(content_type.clone()),
        file_extension: Some(ext),
        metadata: None,
    })
    .await?;

    let upload_url = storage
        .presigned_put(&key, &content_type, PRESIGN_EXPIRES_SECS)
        .await?;

    Ok(HttpResponse::Ok().json(PresignedUploadResponse {
        upload_url,
        asset_id,
        expires_in: PRESIGN_EXPIRES_SECS,
        method: "PUT".to_string(),
        headers: PresignedUploadHeaders { content_type },
    }))
}

/// Confirm a direct upload completed.
///
/// Verifies the object actually landed in storage before flipping the row
/// to ready.
#[utoipa::path(
    post,
    path = "/api/assets/{id}/confirm-upload",
    tag = "Assets",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Asset ready", body = AssetResponse),
        (status = 400, description = "Not awaiting upload or object missing", body = crate::error::ErrorResponse),
        (status = 404, description = "Asset not found", body = crate::error::ErrorResponse)
    )
)]
#[post("/{id}/confirm-upload")]
pub async fn confirm_upload(
    pool: web::Data<DbPool>,
    storage: web::Data<Storage>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let record = pool
        .get_asset_for_user(id, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Asset {}", id)))?;

    if record.status != AssetStatus::Uploading.as_str() {
        return Err(AppError::InvalidInput(format!(
            "Asset {} is not awaiting upload (status: {})",
            id, record.status
        )));
    }

    let info = storage
        .stat(&record.storage_path)
        .await?
        .ok_or_else(|| {
            AppError::InvalidInput(
                "No uploaded object found for this asset. Upload the file first.".to_string(),
            )
        })?;

    let mut metadata = record.metadata.clone().unwrap_or_else(|| json!({}));
    if let Some(map) = metadata.as_object_mut() {
        if let Some(etag) = &info.etag {
            map.insert("etag".to_string(), json!(etag));
        }
        if let Some(modified) = info.last_modified {
            map.insert("last_modified".to_string(), json!(modified));
        }
    }
    pool.set_asset_metadata(record.id, metadata).await?;

    let ready = pool.mark_asset_ready(record.id, info.size).await?;
    info!(asset_id = %ready.id, user_id = %auth.user_id, "Direct upload confirmed");

    let asset = with_urls(&storage, ready).await;
    Ok(HttpResponse::Ok().json(asset))
}

/// Get one asset.
#[utoipa::path(
    get,
    path = "/api/assets/{id}",
    tag = "Assets",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Asset detail", body = AssetResponse),
        (status = 404, description = "Asset not found", body = crate::error::ErrorResponse)
    )
)]
#[get("/{id}")]
pub async fn get_asset(
    pool: web::Data<DbPool>,
    storage: web::Data<Storage>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let record = pool
        .get_asset_for_user(id, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Asset {}", id)))?;

    let asset = with_urls(&storage, record).await;
    Ok(HttpResponse::Ok().json(asset))
}

/// Presigned download for a ready asset.
#[utoipa::path(
    get,
    path = "/api/assets/{id}/download",
    tag = "Assets",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Presigned download URL", body = AssetDownloadResponse),
        (status = 400, description = "Asset is not ready", body = crate::error::ErrorResponse),
        (status = 404, description = "Asset not found", body = crate::error::ErrorResponse)
    )
)]
#[get("/{id}/download")]
pub async fn download_asset(
    pool: web::Data<DbPool>,
    storage: web::Data<Storage>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let record = pool
        .get_asset_for_user(id, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Asset {}", id)))?;

    if record.status != AssetStatus::Ready.as_str() {
        return Err(AppError::InvalidInput(format!(
            "Asset {} is not ready for download (status: {})",
            id, record.status
        )));
    }

    let download_url = storage
        .presigned_get(&record.storage_path, PRESIGN_EXPIRES_SECS)
        .await?;

    Ok(HttpResponse::Ok().json(AssetDownloadResponse {
        download_url,
        filename: record.original_filename,
        expires_in: PRESIGN_EXPIRES_SECS,
    }))
}

/// Delete an asset.
///
/// The storage delete is best effort; the row goes away regardless so the
/// asset stops appearing in lists even when the bucket is unreachable.
#[utoipa::path(
    delete,
    path = "/api/assets/{id}",
    tag = "Assets",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Asset deleted", body = DeleteAssetResponse),
        (status = 404, description = "Asset not found", body = crate::error::ErrorResponse)
    )
)]
#[delete("/{id}")]
pub async fn delete_asset(
    pool: web::Data<DbPool>,
    storage: web::Data<Storage>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let record = pool
        .get_asset_for_user(id, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Asset {}", id)))?;

    if let Err(e) = storage.delete(&record.storage_path).await {
        warn!(asset_id = %id, key = %record.storage_path, "Storage delete failed: {}", e);
    }
    pool.delete_asset(id).await?;
    info!(asset_id = %id, user_id = %auth.user_id, "Asset deleted");

    Ok(HttpResponse::Ok().json(DeleteAssetResponse {
        message: "Asset deleted successfully".to_string(),
        asset_id: id,
    }))
}
