//! Database queries for media assets.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde_json::json;
use uuid::Uuid;

use crate::entity::asset::{self, ActiveModel, Entity as Asset};
use crate::error::{AppError, AppResult};
use crate::models::{AssetStatus, AssetType, PaginationParams};

use super::DbPool;

/// Column values for a newly created asset record.
pub struct NewAsset {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub original_filename: String,
    pub asset_type: AssetType,
    pub status: AssetStatus,
    pub storage_path: String,
    pub storage_bucket: String,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub file_extension: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl DbPool {
    /// Insert a new asset record.
    pub async fn insert_asset(&self, new: NewAsset) -> AppResult<asset::Model> {
        let now = Utc::now();

        let model = ActiveModel {
            id: Set(new.id),
            user_id: Set(new.user_id),
            filename: Set(new.filename),
            original_filename: Set(new.original_filename),
            asset_type: Set(new.asset_type.as_str().to_string()),
            status: Set(new.status.as_str().to_string()),
            storage_path: Set(new.storage_path),
            storage_bucket: Set(new.storage_bucket),
            file_size: Set(new.file_size),
            mime_type: Set(new.mime_type),
            file_extension: Set(new.file_extension),
            metadata: Set(new.metadata),
            processing_info: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert asset: {}", e)))?;

        Ok(result)
    }

    /// Get an asset by ID regardless of owner.
    pub async fn get_asset_by_id(&self, id: Uuid) -> AppResult<Option<asset::Model>> {
        let result = Asset::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get asset: {}", e)))?;

        Ok(result)
    }

    /// Get an asset scoped to its owner. Deleted assets are not visible.
    pub async fn get_asset_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Option<asset::Model>> {
        let result = Asset::find_by_id(id)
            .filter(asset::Column::UserId.eq(user_id))
            .filter(asset::Column::Status.ne(AssetStatus::Deleted.as_str()))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get asset: {}", e)))?;

        Ok(result)
    }

    /// Fetch several assets by ID, scoped to their owner.
    pub async fn get_assets_for_user_by_ids(
        &self,
        ids: &[Uuid],
        user_id: Uuid,
    ) -> AppResult<Vec<asset::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let result = Asset::find()
            .filter(asset::Column::Id.is_in(ids.to_vec()))
            .filter(asset::Column::UserId.eq(user_id))
            .filter(asset::Column::Status.ne(AssetStatus::Deleted.as_str()))
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get assets: {}", e)))?;

        Ok(result)
    }

    /// List a user's assets with optional type and status filters.
    ///
    /// Deleted assets are excluded unless the status filter asks for them.
    pub async fn list_assets(
        &self,
        user_id: Uuid,
        asset_type: Option<AssetType>,
        status: Option<AssetStatus>,
        pagination: &PaginationParams,
    ) -> AppResult<(Vec<asset::Model>, u64)> {
        let mut select = Asset::find().filter(asset::Column::UserId.eq(user_id));

        if let Some(asset_type) = asset_type {
            select = select.filter(asset::Column::AssetType.eq(asset_type.as_str()));
        }

        match status {
            Some(status) => {
                select = select.filter(asset::Column::Status.eq(status.as_str()));
            }
            None => {
                select = select.filter(asset::Column::Status.ne(AssetStatus::Deleted.as_str()));
            }
        }

        let total = select
            .clone()
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count assets: {}", e)))?;

        let assets = select
            .order_by_desc(asset::Column::CreatedAt)
            .offset(pagination.offset())
            .limit(pagination.clamped_per_page())
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list assets: {}", e)))?;

        Ok((assets, total))
    }

    /// Update an asset's status.
    pub async fn update_asset_status(&self, id: Uuid, status: AssetStatus) -> AppResult<asset::Model> {
        let asset = self
            .get_asset_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Asset {} not found", id)))?;

        let mut active: ActiveModel = asset.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now());

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update asset status: {}", e)))?;

        Ok(result)
    }

    /// Mark an asset ready after its object has been verified in storage.
    pub async fn mark_asset_ready(
        &self,
        id: Uuid,
        file_size: Option<i64>,
    ) -> AppResult<asset::Model> {
        let asset = self
            .get_asset_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Asset {} not found", id)))?;

        let mut active: ActiveModel = asset.into();
        active.status = Set(AssetStatus::Ready.as_str().to_string());
        if file_size.is_some() {
            active.file_size = Set(file_size);
        }
        active.updated_at = Set(Utc::now());

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to mark asset ready: {}", e)))?;

        Ok(result)
    }

    /// Replace an asset's metadata document.
    pub async fn set_asset_metadata(
        &self,
        id: Uuid,
        metadata: serde_json::Value,
    ) -> AppResult<asset::Model> {
        let asset = self
            .get_asset_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Asset {} not found", id)))?;

        let mut active: ActiveModel = asset.into();
        active.metadata = Set(Some(metadata));
        active.updated_at = Set(Utc::now());

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to set asset metadata: {}", e)))?;

        Ok(result)
    }

    /// Mark an asset as failed with a reason.
    pub async fn mark_asset_error(&self, id: Uuid, message: &str) -> AppResult<asset::Model> {
        let asset = self
            .get_asset_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Asset {} not found", id)))?;

        let mut active: ActiveModel = asset.into();
        active.status = Set(AssetStatus::Error.as_str().to_string());
        active.processing_info = Set(Some(json!({ "error": message })));
        active.updated_at = Set(Utc::now());

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to mark asset error: {}", e)))?;

        Ok(result)
    }

    /// Remove an asset record. The storage object is deleted separately.
    pub async fn delete_asset(&self, id: Uuid) -> AppResult<()> {
        Asset::delete_by_id(id)
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete asset: {}", e)))?;

        Ok(())
    }
}
