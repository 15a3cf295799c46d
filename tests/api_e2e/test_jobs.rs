//! E2E tests: job lifecycle, claim semantics, and ownership isolation.

use serde_json::json;
use uuid::Uuid;

use voice_lecturer_lib::models::{AssetType, JobType};

use super::test_helpers::*;

fn tts_params(voice_asset_id: Uuid) -> serde_json::Value {
    json!({
        "text": "Welcome to the course.",
        "voice_asset_id": voice_asset_id,
    })
}

#[actix_rt::test]
async fn test_create_tts_job_returns_pending() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, user_id) = register_and_login(&app).await;

    let asset = seed_ready_asset(&env.pool, user_id, AssetType::VoiceSample).await;

    let (status, body) = api_post(
        &app,
        "/api/jobs",
        Some(&token),
        Some(json!({
            "title": "Intro lecture narration",
            "job_type": "text_to_speech",
            "parameters": tts_params(asset.id),
        })),
    )
    .await;

    assert_eq!(status, 201, "{}", body);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["job_type"], "text_to_speech");
    assert_eq!(body["progress_percentage"], 0);
    assert!(body["id"].is_string());
    assert!(body["task_id"].is_string(), "create carries the task id");
}

#[actix_rt::test]
async fn test_create_tts_job_with_missing_voice_asset() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, _) = register_and_login(&app).await;

    let (status, body) = api_post(
        &app,
        "/api/jobs",
        Some(&token),
        Some(json!({
            "title": "Narration without a voice",
            "job_type": "text_to_speech",
            "parameters": tts_params(Uuid::now_v7()),
        })),
    )
    .await;
    assert_eq!(status, 404, "{}", body);
    assert_eq!(body["error"], "NOT_FOUND");

    // The rejection happened before insert, so no job row exists.
    let (status, listed) = api_get(&app, "/api/jobs", Some(&token)).await;
    assert_eq!(status, 200);
    assert_eq!(listed["pagination"]["total"], 0);
}

#[actix_rt::test]
async fn test_create_job_rejects_bad_parameters() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, _) = register_and_login(&app).await;

    let (status, body) = api_post(
        &app,
        "/api/jobs",
        Some(&token),
        Some(json!({
            "title": "Missing everything",
            "job_type": "text_to_speech",
            "parameters": {},
        })),
    )
    .await;
    assert_eq!(status, 400, "{}", body);
    assert_eq!(body["error"], "INVALID_INPUT");

    let (status, body) = api_post(
        &app,
        "/api/jobs",
        Some(&token),
        Some(json!({
            "title": "",
            "job_type": "script_generation",
            "parameters": { "topic": "Photosynthesis" },
        })),
    )
    .await;
    assert_eq!(status, 400, "{}", body);
}

#[actix_rt::test]
async fn test_cancel_pending_job() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, user_id) = register_and_login(&app).await;

    let asset = seed_ready_asset(&env.pool, user_id, AssetType::VoiceSample).await;
    let job = seed_pending_job(
        &env.pool,
        user_id,
        JobType::TextToSpeech,
        tts_params(asset.id),
    )
    .await;

    let (status, body) = api_post(
        &app,
        &format!("/api/jobs/{}/cancel", job.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["status"], "cancelled");

    let (status, detail) = api_get(&app, &format!("/api/jobs/{}", job.id), Some(&token)).await;
    assert_eq!(status, 200);
    assert_eq!(detail["status"], "cancelled");
}

#[actix_rt::test]
async fn test_cancel_completed_job_rejected() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, user_id) = register_and_login(&app).await;

    let asset = seed_ready_asset(&env.pool, user_id, AssetType::VoiceSample).await;
    let job = seed_pending_job(
        &env.pool,
        user_id,
        JobType::TextToSpeech,
        tts_params(asset.id),
    )
    .await;

    assert!(env.pool.claim_job(job.id, Uuid::now_v7()).await.unwrap());
    assert!(env
        .pool
        .complete_job(job.id, json!({ "generated_audio_id": Uuid::now_v7() }))
        .await
        .unwrap());

    let (status, body) = api_post(
        &app,
        &format!("/api/jobs/{}/cancel", job.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 400, "{}", body);
}

#[actix_rt::test]
async fn test_claim_job_exactly_once() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (_, user_id) = register_and_login(&app).await;

    let asset = seed_ready_asset(&env.pool, user_id, AssetType::VoiceSample).await;
    let job = seed_pending_job(
        &env.pool,
        user_id,
        JobType::TextToSpeech,
        tts_params(asset.id),
    )
    .await;

    let task_id = Uuid::now_v7();
    assert!(env.pool.claim_job(job.id, task_id).await.unwrap());
    // A second claim must lose: the job is no longer pending.
    assert!(!env.pool.claim_job(job.id, Uuid::now_v7()).await.unwrap());

    let claimed = env
        .pool
        .get_job_by_id(job.id)
        .await
        .unwrap()
        .expect("job row");
    assert_eq!(claimed.status, "processing");
    assert_eq!(claimed.task_id, Some(task_id));
    assert!(claimed.started_at.is_some());
}

#[actix_rt::test]
async fn test_job_ownership_isolation() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (_, owner_id) = register_and_login(&app).await;
    let (other_token, _) = register_and_login(&app).await;

    let asset = seed_ready_asset(&env.pool, owner_id, AssetType::VoiceSample).await;
    let job = seed_pending_job(
        &env.pool,
        owner_id,
        JobType::TextToSpeech,
        tts_params(asset.id),
    )
    .await;

    let (status, body) = api_get(&app, &format!("/api/jobs/{}", job.id), Some(&other_token)).await;
    assert_eq!(status, 404, "{}", body);
    assert_eq!(body["error"], "NOT_FOUND");

    let (status, _) = api_post(
        &app,
        &format!("/api/jobs/{}/cancel", job.id),
        Some(&other_token),
        None,
    )
    .await;
    assert_eq!(status, 404);

    let (status, _) = api_delete(&app, &format!("/api/jobs/{}", job.id), &other_token).await;
    assert_eq!(status, 404);

    // Creating a job against someone else's asset is also a 404.
    let (status, body) = api_post(
        &app,
        "/api/jobs",
        Some(&other_token),
        Some(json!({
            "title": "Borrowed voice",
            "job_type": "text_to_speech",
            "parameters": tts_params(asset.id),
        })),
    )
    .await;
    assert_eq!(status, 404, "{}", body);
}

#[actix_rt::test]
async fn test_progress_updates_and_poll() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, user_id) = register_and_login(&app).await;

    let asset = seed_ready_asset(&env.pool, user_id, AssetType::VoiceSample).await;
    let job = seed_pending_job(
        &env.pool,
        user_id,
        JobType::TextToSpeech,
        tts_params(asset.id),
    )
    .await;
    assert!(env.pool.claim_job(job.id, Uuid::now_v7()).await.unwrap());

    let (status, body) = api_put(
        &app,
        &format!("/api/jobs/{}/progress", job.id),
        &token,
        json!({ "progress_percentage": 42, "message": "Synthesizing speech" }),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["progress_percentage"], 42);
    assert_eq!(body["progress_message"], "Synthesizing speech");

    let (status, poll) = api_get(&app, &format!("/api/jobs/{}/status", job.id), Some(&token)).await;
    assert_eq!(status, 200, "{}", poll);
    assert_eq!(poll["status"], "processing");
    assert_eq!(poll["progress_percentage"], 42);

    // Out-of-range progress is refused.
    let (status, _) = api_put(
        &app,
        &format!("/api/jobs/{}/progress", job.id),
        &token,
        json!({ "progress_percentage": 101 }),
    )
    .await;
    assert_eq!(status, 400);
}

#[actix_rt::test]
async fn test_steps_create_and_list() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, user_id) = register_and_login(&app).await;

    let asset = seed_ready_asset(&env.pool, user_id, AssetType::VoiceSample).await;
    let job = seed_pending_job(
        &env.pool,
        user_id,
        JobType::TextToSpeech,
        tts_params(asset.id),
    )
    .await;

    let (status, first) = api_post(
        &app,
        &format!("/api/jobs/{}/steps", job.id),
        Some(&token),
        Some(json!({ "name": "Download voice sample" })),
    )
    .await;
    assert_eq!(status, 201, "{}", first);
    assert_eq!(first["step_order"], 1);
    assert_eq!(first["status"], "pending");

    let (status, second) = api_post(
        &app,
        &format!("/api/jobs/{}/steps", job.id),
        Some(&token),
        Some(json!({ "name": "Synthesize audio" })),
    )
    .await;
    assert_eq!(status, 201, "{}", second);
    assert_eq!(second["step_order"], 2);

    let (status, listed) = api_get(&app, &format!("/api/jobs/{}/steps", job.id), Some(&token)).await;
    assert_eq!(status, 200, "{}", listed);
    let steps = listed["steps"].as_array().expect("steps array");
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0]["name"], "Download voice sample");
    assert_eq!(steps[1]["name"], "Synthesize audio");
}

#[actix_rt::test]
async fn test_delete_pending_job() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, user_id) = register_and_login(&app).await;

    let asset = seed_ready_asset(&env.pool, user_id, AssetType::VoiceSample).await;
    let job = seed_pending_job(
        &env.pool,
        user_id,
        JobType::TextToSpeech,
        tts_params(asset.id),
    )
    .await;

    let (status, body) = api_delete(&app, &format!("/api/jobs/{}", job.id), &token).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["job_id"], job.id.to_string());

    let (status, _) = api_get(&app, &format!("/api/jobs/{}", job.id), Some(&token)).await;
    assert_eq!(status, 404);
}

#[actix_rt::test]
async fn test_update_terminal_job_rejected() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, user_id) = register_and_login(&app).await;

    let asset = seed_ready_asset(&env.pool, user_id, AssetType::VoiceSample).await;
    let job = seed_pending_job(
        &env.pool,
        user_id,
        JobType::TextToSpeech,
        tts_params(asset.id),
    )
    .await;
    assert!(env.pool.claim_job(job.id, Uuid::now_v7()).await.unwrap());
    assert!(env.pool.complete_job(job.id, json!({})).await.unwrap());

    let (status, body) = api_put(
        &app,
        &format!("/api/jobs/{}", job.id),
        &token,
        json!({ "title": "Renamed after the fact" }),
    )
    .await;
    assert_eq!(status, 400, "{}", body);
}
