//! Migration: Create job_steps table.

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
                CREATE TABLE job_steps (
                    id UUID PRIMARY KEY,
                    job_id UUID NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
                    name VARCHAR(100) NOT NULL,
                    description VARCHAR(500),
                    step_order INTEGER NOT NULL DEFAULT 0,
                    status VARCHAR(20) NOT NULL DEFAULT 'pending'
                        CHECK (status IN ('pending', 'running', 'completed', 'failed', 'skipped')),
                    progress_percentage INTEGER NOT NULL DEFAULT 0
                        CHECK (progress_percentage >= 0 AND progress_percentage <= 100),
                    estimated_duration INTEGER,
                    input_data JSONB,
                    output_data JSONB,
                    error_info JSONB,

                    started_at TIMESTAMPTZ,
                    completed_at TIMESTAMPTZ,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                -- Steps are always read in order within one job
                CREATE INDEX idx_job_steps_job_order ON job_steps(job_id, step_order);

                CREATE TRIGGER update_job_steps_updated_at
                    BEFORE UPDATE ON job_steps
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
                DROP TRIGGER IF EXISTS update_job_steps_updated_at ON job_steps;
                DROP TABLE IF EXISTS job_steps CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
