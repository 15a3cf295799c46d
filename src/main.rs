//! Voice Lecturer Server - Main entry point.
//!
//! Starts the Actix-web server with configured routes and middleware.

use actix_cors::Cors;
use actix_web::{http::header, web, App, HttpServer};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use voice_lecturer_lib::api;
use voice_lecturer_lib::api::ApiDoc;
use voice_lecturer_lib::config::Config;
use voice_lecturer_lib::db::DbPool;
use voice_lecturer_lib::middleware::RequestLogger;
use voice_lecturer_lib::services::ai::AiClients;
use voice_lecturer_lib::services::{
    start_cleanup_task, CleanupConfig, EventBroadcaster, PipelineContext, Storage,
};

/// Perform health check (for Docker healthcheck).
async fn health_check() -> bool {
    Config::from_env().is_ok()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Check for --health-check flag (used by Docker HEALTHCHECK)
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|arg| arg == "--health-check") {
        dotenvy::dotenv().ok();
        if health_check().await {
            std::process::exit(0);
        } else {
            std::process::exit(1);
        }
    }

    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, DATABASE_URL and VCL_JWT_SECRET must be set");
            error!("  - In production, S3 credentials and HF_API_TOKEN must be set");
            error!("  - In production, values must not match development defaults");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Voice Lecturer Server");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
        info!("Using development defaults for DATABASE_URL, S3, and the AI spaces");
    }

    // Create data directories
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .expect("Failed to create data directory");
    tokio::fs::create_dir_all(config.data_dir.join("scratch"))
        .await
        .expect("Failed to create scratch directory");

    // Initialize database and run migrations
    let pool = DbPool::new(&config)
        .await
        .expect("Failed to connect to database");
    info!("Database connection established");

    pool.run_migrations()
        .await
        .expect("Failed to run migrations");
    info!("Database migrations complete");

    // Object storage and hosted AI clients
    let storage = Storage::new(&config.storage)
        .await
        .expect("Failed to initialize object storage");
    info!(bucket = %storage.bucket(), "Object storage client ready");

    let ai = AiClients::from_settings(&config.ai).expect("Failed to build AI service clients");

    // Event fan-out for WebSocket sessions
    let broadcaster = EventBroadcaster::new();

    // Shared context handed to every spawned pipeline task
    let pipeline_ctx = PipelineContext::new(
        pool.clone(),
        storage.clone(),
        ai.clone(),
        broadcaster.clone(),
        config.data_dir.clone(),
    );

    // Start the cleanup background task
    let cleanup_config = CleanupConfig {
        data_dir: config.data_dir.clone(),
        retention_hours: config.retention_hours,
        interval_secs: if config.is_development() { 60 } else { 3600 }, // 1 min dev, 1 hour prod
    };
    start_cleanup_task(pool.clone(), cleanup_config);
    info!(
        "Cleanup service started (scratch retention: {} hours)",
        config.retention_hours
    );

    let bind_address = config.bind_address();
    let max_upload_size = config.max_upload_size;
    let is_development = config.is_development();

    let worker_count = if is_development {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!(
            "Starting server at http://{} ({} workers)",
            bind_address, cpus
        );
        cpus
    };

    // Start HTTP server
    let server = HttpServer::new(move || {
        // Configure CORS
        let cors = if is_development {
            // Permissive CORS for local frontend dev servers
            Cors::default()
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allowed_origin("http://localhost:3001")
                .allowed_origin("http://localhost:3002")
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .allowed_headers(vec![
                    header::AUTHORIZATION,
                    header::ACCEPT,
                    header::CONTENT_TYPE,
                ])
                .max_age(3600)
        } else {
            // Restrictive CORS for production (same-origin only)
            Cors::default()
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .allowed_headers(vec![
                    header::AUTHORIZATION,
                    header::ACCEPT,
                    header::CONTENT_TYPE,
                ])
                .max_age(3600)
        };

        App::new()
            // CORS must wrap before other middleware
            .wrap(cors)
            .wrap(RequestLogger)
            // Shared state
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(storage.clone()))
            .app_data(web::Data::new(ai.clone()))
            .app_data(web::Data::new(broadcaster.clone()))
            .app_data(web::Data::new(pipeline_ctx.clone()))
            // Allow 2x the upload cap at the HTTP layer; the multipart reader
            // enforces the real limit and returns a structured 400.
            .app_data(web::PayloadConfig::new(max_upload_size.saturating_mul(2)))
            // Probes at the root
            .configure(api::configure_health_routes)
            // API routes
            .service(
                web::scope("/api")
                    .configure(api::configure_auth_routes)
                    .configure(api::configure_asset_routes)
                    .configure(api::configure_job_routes)
                    .configure(api::configure_generate_routes)
                    .configure(api::configure_export_routes)
                    .configure(api::configure_worker_routes)
                    .configure(api::configure_analytics_routes),
            )
            // Interactive API docs
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    });

    server
        .workers(worker_count)
        .bind(&bind_address)?
        .run()
        .await
}
