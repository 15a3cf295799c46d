//! Migration: Create assets table.
//!
//! Rows track user-owned media in object storage. The database record is
//! the source of truth; object keys are never listed to reconstruct state.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE assets (
                    id UUID PRIMARY KEY,
                    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    filename VARCHAR(255) NOT NULL,
                    original_filename VARCHAR(255) NOT NULL,
                    asset_type VARCHAR(20) NOT NULL
                        CHECK (asset_type IN ('portrait', 'voice_sample', 'script', 'generated_audio', 'generated_video')),
                    status VARCHAR(20) NOT NULL DEFAULT 'uploading'
                        CHECK (status IN ('uploading', 'processing', 'ready', 'error', 'deleted')),
                    storage_path VARCHAR(500) NOT NULL,
                    storage_bucket VARCHAR(100) NOT NULL,
                    file_size BIGINT,
                    mime_type VARCHAR(100),
                    file_extension VARCHAR(20),
                    metadata JSONB,
                    processing_info JSONB,

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                -- Listing queries filter by owner, then type and status
                CREATE INDEX idx_assets_user_id ON assets(user_id);
                CREATE INDEX idx_assets_user_type ON assets(user_id, asset_type);
                CREATE INDEX idx_assets_status ON assets(status);
                CREATE INDEX idx_assets_created_at ON assets(created_at);

                CREATE TRIGGER update_assets_updated_at
                    BEFORE UPDATE ON assets
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DROP TRIGGER IF EXISTS update_assets_updated_at ON assets;
                DROP TABLE IF EXISTS assets CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
