//! API endpoint modules.

pub mod analytics;
pub mod assets;
pub mod auth;
pub mod export;
pub mod generate;
pub mod health;
pub mod jobs;
pub mod openapi;
pub mod websocket;
pub mod worker;

pub use analytics::configure_routes as configure_analytics_routes;
pub use assets::configure_routes as configure_asset_routes;
pub use auth::configure_routes as configure_auth_routes;
pub use export::configure_routes as configure_export_routes;
pub use generate::configure_routes as configure_generate_routes;
pub use health::configure_health_routes;
pub use jobs::configure_routes as configure_job_routes;
pub use openapi::ApiDoc;
pub use worker::configure_routes as configure_worker_routes;
