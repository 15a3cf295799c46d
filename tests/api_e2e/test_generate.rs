//! E2E tests: generation trigger endpoints.
//!
//! No Hugging Face token is configured in the test environment, so spawned
//! tasks fail once they reach their service call. These tests only assert
//! the accept/reject contract of the triggers themselves.

use serde_json::json;
use uuid::Uuid;

use voice_lecturer_lib::models::AssetType;

use super::test_helpers::*;

#[actix_rt::test]
async fn test_generate_script_accepted() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, _) = register_and_login(&app).await;

    let (status, body) = api_post(
        &app,
        "/api/generate/script",
        Some(&token),
        Some(json!({ "topic": "Photosynthesis", "duration_minutes": 5 })),
    )
    .await;
    assert_eq!(status, 202, "{}", body);
    assert_eq!(body["status"], "pending");
    assert!(body["task_id"].is_string());
    let job_id = body["job_id"].as_str().expect("job_id");

    let (status, job) = api_get(&app, &format!("/api/jobs/{}", job_id), Some(&token)).await;
    assert_eq!(status, 200, "{}", job);
    assert_eq!(job["job_type"], "script_generation");
    assert_eq!(job["title"], "Script generation");
}

#[actix_rt::test]
async fn test_generate_script_requires_topic() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, _) = register_and_login(&app).await;

    let (status, body) = api_post(
        &app,
        "/api/generate/script",
        Some(&token),
        Some(json!({ "topic": "   " })),
    )
    .await;
    assert_eq!(status, 400, "{}", body);
    assert_eq!(body["error"], "INVALID_INPUT");
}

#[actix_rt::test]
async fn test_generate_speech_with_missing_asset() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, _) = register_and_login(&app).await;

    let (status, body) = api_post(
        &app,
        "/api/generate/speech",
        Some(&token),
        Some(json!({
            "text": "Hello class",
            "voice_asset_id": Uuid::now_v7(),
        })),
    )
    .await;
    assert_eq!(status, 404, "{}", body);

    let (status, listed) = api_get(&app, "/api/jobs", Some(&token)).await;
    assert_eq!(status, 200);
    assert_eq!(listed["pagination"]["total"], 0, "no job row on rejection");
}

#[actix_rt::test]
async fn test_generate_voice_clone_accepted() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, user_id) = register_and_login(&app).await;

    let asset = seed_ready_asset(&env.pool, user_id, AssetType::VoiceSample).await;

    let (status, body) = api_post(
        &app,
        "/api/generate/voice-clone",
        Some(&token),
        Some(json!({ "voice_asset_id": asset.id })),
    )
    .await;
    assert_eq!(status, 202, "{}", body);
    assert_eq!(body["status"], "pending");
}

#[actix_rt::test]
async fn test_generate_full_requires_topic_or_script() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, user_id) = register_and_login(&app).await;

    let voice = seed_ready_asset(&env.pool, user_id, AssetType::VoiceSample).await;
    let portrait = seed_ready_asset(&env.pool, user_id, AssetType::Portrait).await;

    let (status, body) = api_post(
        &app,
        "/api/generate/full",
        Some(&token),
        Some(json!({
            "voice_asset_id": voice.id,
            "portrait_asset_id": portrait.id,
        })),
    )
    .await;
    assert_eq!(status, 400, "{}", body);

    let (status, body) = api_post(
        &app,
        "/api/generate/full",
        Some(&token),
        Some(json!({
            "topic": "Photosynthesis",
            "voice_asset_id": voice.id,
            "portrait_asset_id": portrait.id,
        })),
    )
    .await;
    assert_eq!(status, 202, "{}", body);
}

#[actix_rt::test]
async fn test_services_health_reports_all_services() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;

    // No auth required; dashboards poll this endpoint.
    let (status, body) = api_get(&app, "/api/generate/health", None).await;
    assert_eq!(status, 200, "{}", body);
    assert!(body["status"].is_string());
    // The LLM probe short-circuits without a token.
    assert_eq!(body["services"]["llm"]["status"], "unconfigured");
    assert!(body["services"]["tts"]["status"].is_string());
    assert!(body["services"]["video"]["status"].is_string());
}
