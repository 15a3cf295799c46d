//! Migration: Create jobs table.
//!
//! Jobs carry typed parameters, results and the pipeline checkpoint as
//! JSONB. task_id identifies the in-process task executing the job.

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
                CREATE TABLE jobs (
                    id UUID PRIMARY KEY,
                    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    title VARCHAR(200) NOT NULL,
                    description VARCHAR(1000),
                    job_type VARCHAR(30) NOT NULL
                        CHECK (job_type IN ('script_generation', 'text_to_speech', 'video_generation', 'voice_clone', 'full_pipeline')),
                    status VARCHAR(20) NOT NULL DEFAULT 'pending'
                        CHECK (status IN ('pending', 'processing', 'completed', 'failed', 'cancelled')),
                    priority VARCHAR(10) NOT NULL DEFAULT 'normal'
                        CHECK (priority IN ('low', 'normal', 'high', 'urgent')),
                    progress_percentage INTEGER NOT NULL DEFAULT 0
                        CHECK (progress_percentage >= 0 AND progress_percentage <= 100),
                    progress_message VARCHAR(500),
                    parameters JSONB NOT NULL,
                    results JSONB,
                    error_info JSONB,
                    service_metadata JSONB,
                    checkpoint JSONB,
                    task_id UUID,
                    estimated_duration INTEGER,

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    started_at TIMESTAMPTZ,
                    completed_at TIMESTAMPTZ,
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_jobs_user_id ON jobs(user_id);
                CREATE INDEX idx_jobs_user_status ON jobs(user_id, status);
                CREATE INDEX idx_jobs_user_type ON jobs(user_id, job_type);
                CREATE INDEX idx_jobs_created_at ON jobs(created_at);
                CREATE INDEX idx_jobs_task_id ON jobs(task_id) WHERE task_id IS NOT NULL;

                -- Active jobs are polled by the worker status endpoint
                CREATE INDEX idx_jobs_active ON jobs(status)
                    WHERE status IN ('pending', 'processing');

                CREATE TRIGGER update_jobs_updated_at
                    BEFORE UPDATE ON jobs
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
                DROP TRIGGER IF EXISTS update_jobs_updated_at ON jobs;
                DROP TABLE IF EXISTS jobs CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
