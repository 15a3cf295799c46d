//! SeaORM database migrations.

pub use sea_orm_migration::prelude::*;

mod m20260810_000001_create_users;
mod m20260810_000002_create_assets;
mod m20260810_000003_create_jobs;
mod m20260810_000004_create_job_steps;
mod m20260810_000005_create_refresh_tokens;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260810_000001_create_users::Migration),
            Box::new(m20260810_000002_create_assets::Migration),
            Box::new(m20260810_000003_create_jobs::Migration),
            Box::new(m20260810_000004_create_job_steps::Migration),
            Box::new(m20260810_000005_create_refresh_tokens::Migration),
        ]
    }
}
