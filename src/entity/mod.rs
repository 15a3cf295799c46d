//! SeaORM entity definitions for PostgreSQL database.

pub mod asset;
pub mod job;
pub mod job_step;
pub mod refresh_token;
pub mod user;
