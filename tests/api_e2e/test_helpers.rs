//! Shared helpers for the API E2E suite.

use std::sync::OnceLock;

use actix_web::dev::ServiceResponse;
use actix_web::{test, web, App};
use secrecy::SecretString;
use serde_json::{json, Value};
use uuid::Uuid;

use voice_lecturer_lib::api;
use voice_lecturer_lib::config::{
    defaults, AiSettings, Config, DatabaseSettings, Environment, JwtSettings, StorageSettings,
};
use voice_lecturer_lib::db::assets::NewAsset;
use voice_lecturer_lib::db::jobs::NewJob;
use voice_lecturer_lib::db::DbPool;
use voice_lecturer_lib::entity::{asset, job};
use voice_lecturer_lib::models::{AssetStatus, AssetType, JobPriority, JobType};
use voice_lecturer_lib::services::ai::AiClients;
use voice_lecturer_lib::services::{EventBroadcaster, PipelineContext, Storage};

static MIGRATIONS_RUN: OnceLock<()> = OnceLock::new();
static SKIP_NOTICE: OnceLock<()> = OnceLock::new();

/// Test password that satisfies the strength rules.
pub const TEST_PASSWORD: &str = "Passw0rd123";

/// Build a test config without touching process environment variables.
///
/// Returns None when TEST_DATABASE_URL is unset, which turns every test in
/// the suite into a silent skip.
pub fn test_config() -> Option<Config> {
    let Ok(db_url) = std::env::var("TEST_DATABASE_URL") else {
        SKIP_NOTICE.get_or_init(|| {
            eprintln!("TEST_DATABASE_URL not set; skipping API E2E tests");
        });
        return None;
    };
    let s3_endpoint = std::env::var("TEST_S3_ENDPOINT")
        .unwrap_or_else(|_| defaults::DEV_S3_ENDPOINT.to_string());

    Some(Config {
        environment: Environment::Development,
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseSettings {
            url: db_url,
            max_connections: 4,
            min_connections: 1,
        },
        data_dir: std::env::temp_dir().join("vcl-e2e"),
        max_upload_size: 10 * 1024 * 1024,
        retention_hours: 1,
        storage: StorageSettings {
            endpoint: Some(s3_endpoint),
            bucket: "vcl-e2e-test".to_string(),
            region: defaults::DEV_S3_REGION.to_string(),
            access_key: defaults::DEV_S3_ACCESS_KEY.to_string(),
            secret_key: defaults::DEV_S3_SECRET_KEY.to_string(),
        },
        jwt: JwtSettings {
            secret: SecretString::from("api-e2e-test-secret"),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_days: 30,
        },
        ai: AiSettings {
            hf_api_token: None,
            llm_base_url: defaults::DEV_LLM_BASE_URL.to_string(),
            llm_model: defaults::DEV_LLM_MODEL.to_string(),
            llm_timeout_secs: 30,
            tts_space: defaults::DEV_TTS_SPACE.to_string(),
            tts_timeout_secs: 30,
            video_space: defaults::DEV_VIDEO_SPACE.to_string(),
            video_timeout_secs: 30,
        },
    })
}

/// Connect to the test database. Migrations run only once per process.
pub async fn create_test_pool(config: &Config) -> DbPool {
    let pool = DbPool::new(config)
        .await
        .expect("Failed to connect to database. Is PostgreSQL running?");

    if MIGRATIONS_RUN.get().is_none() {
        pool.run_migrations()
            .await
            .expect("Failed to run migrations");
        let _ = MIGRATIONS_RUN.set(());
    }

    pool
}

/// Everything a test needs to exercise the API.
pub struct TestEnv {
    pub config: Config,
    pub pool: DbPool,
    pub storage: Storage,
    pub ai: AiClients,
    pub broadcaster: EventBroadcaster,
}

impl TestEnv {
    /// Set up the pool, storage, and service clients.
    ///
    /// None without TEST_DATABASE_URL; panics when the backing services are
    /// configured but unreachable.
    pub async fn init() -> Option<TestEnv> {
        let config = test_config()?;
        let pool = create_test_pool(&config).await;
        let storage = Storage::new(&config.storage)
            .await
            .expect("Failed to reach object storage. Is MinIO running?");
        let ai = AiClients::from_settings(&config.ai).expect("Failed to build AI clients");
        let broadcaster = EventBroadcaster::new();

        Some(TestEnv {
            config,
            pool,
            storage,
            ai,
            broadcaster,
        })
    }

    /// Build the full application for this environment.
    pub async fn app(
        &self,
    ) -> impl actix_web::dev::Service<
        actix_http::Request,
        Response = ServiceResponse,
        Error = actix_web::Error,
    > {
        let ctx = PipelineContext::new(
            self.pool.clone(),
            self.storage.clone(),
            self.ai.clone(),
            self.broadcaster.clone(),
            self.config.data_dir.clone(),
        );

        test::init_service(
            App::new()
                .app_data(web::Data::new(self.config.clone()))
                .app_data(web::Data::new(self.pool.clone()))
                .app_data(web::Data::new(self.storage.clone()))
                .app_data(web::Data::new(self.ai.clone()))
                .app_data(web::Data::new(self.broadcaster.clone()))
                .app_data(web::Data::new(ctx))
                .configure(api::configure_health_routes)
                .service(
                    web::scope("/api")
                        .configure(api::configure_auth_routes)
                        .configure(api::configure_asset_routes)
                        .configure(api::configure_job_routes)
                        .configure(api::configure_generate_routes)
                        .configure(api::configure_export_routes)
                        .configure(api::configure_worker_routes)
                        .configure(api::configure_analytics_routes),
                ),
        )
        .await
    }
}

/// Short unique suffix for emails and usernames.
pub fn unique_suffix() -> String {
    Uuid::new_v4()
        .to_string()
        .split('-')
        .next()
        .unwrap()
        .to_string()
}

fn attach_token(req: test::TestRequest, token: Option<&str>) -> test::TestRequest {
    match token {
        Some(token) => req.insert_header(("Authorization", format!("Bearer {}", token))),
        None => req,
    }
}

/// GET a path, optionally authenticated.
pub async fn api_get<S>(app: &S, path: &str, token: Option<&str>) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = attach_token(test::TestRequest::get().uri(path), token).to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status().as_u16();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

/// POST a path, optionally with a JSON body.
pub async fn api_post<S>(
    app: &S,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let mut req = attach_token(test::TestRequest::post().uri(path), token);
    if let Some(body) = body {
        req = req.set_json(body);
    }
    let resp = test::call_service(app, req.to_request()).await;
    let status = resp.status().as_u16();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

/// PUT a path with a JSON body.
pub async fn api_put<S>(app: &S, path: &str, token: &str, body: Value) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = test::TestRequest::put()
        .uri(path)
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(body)
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status().as_u16();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

/// DELETE a path.
pub async fn api_delete<S>(app: &S, path: &str, token: &str) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = test::TestRequest::delete()
        .uri(path)
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status().as_u16();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

/// Register a fresh account; returns the raw response.
pub async fn register_user<S>(app: &S, suffix: &str) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    api_post(
        app,
        "/api/auth/register",
        None,
        Some(json!({
            "email": format!("lecturer_{}@example.edu", suffix),
            "username": format!("lecturer_{}", suffix),
            "password": TEST_PASSWORD,
            "confirm_password": TEST_PASSWORD,
            "first_name": "Test",
            "last_name": "Lecturer",
        })),
    )
    .await
}

/// Register a fresh account and return its bearer token and user id.
pub async fn register_and_login<S>(app: &S) -> (String, Uuid)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let suffix = unique_suffix();
    let (status, body) = register_user(app, &suffix).await;
    assert_eq!(status, 201, "Registration should succeed: {}", body);

    let token = body["access_token"]
        .as_str()
        .expect("access_token in register response")
        .to_string();
    let user_id = body["user"]["id"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .expect("user id in register response");
    (token, user_id)
}

/// Insert a ready asset row directly, bypassing object storage.
///
/// The object itself is never written, which is fine for tests that only
/// exercise ownership checks and job creation.
pub async fn seed_ready_asset(pool: &DbPool, user_id: Uuid, asset_type: AssetType) -> asset::Model {
    let id = Uuid::now_v7();
    let ext = match asset_type {
        AssetType::Portrait => "png",
        AssetType::VoiceSample => "wav",
        AssetType::Script => "txt",
        AssetType::GeneratedAudio => "wav",
        AssetType::GeneratedVideo => "mp4",
    };
    let key = Storage::user_asset_key(user_id, asset_type, id, ext);

    let record = pool
        .insert_asset(NewAsset {
            id,
            user_id,
            filename: format!("{}.{}", id, ext),
            original_filename: format!("sample.{}", ext),
            asset_type,
            status: AssetStatus::Uploading,
            storage_path: key,
            storage_bucket: "vcl-e2e-test".to_string(),
            file_size: Some(4),
            mime_type: Some(Storage::content_type_for_extension(ext).to_string()),
            file_extension: Some(ext.to_string()),
            metadata: None,
        })
        .await
        .expect("Failed to insert asset");

    pool.mark_asset_ready(record.id, Some(4))
        .await
        .expect("Failed to mark asset ready")
}

/// Insert a pending job directly, without handing it to the pipeline.
pub async fn seed_pending_job(
    pool: &DbPool,
    user_id: Uuid,
    job_type: JobType,
    parameters: Value,
) -> job::Model {
    pool.insert_job(NewJob {
        id: Uuid::now_v7(),
        user_id,
        title: "Seeded job".to_string(),
        description: None,
        job_type,
        priority: JobPriority::Normal,
        parameters,
        estimated_duration: None,
    })
    .await
    .expect("Failed to insert job")
}
