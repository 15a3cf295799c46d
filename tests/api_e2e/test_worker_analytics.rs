//! E2E tests: health probes, worker introspection, and the analytics dashboard.

use serde_json::json;
use uuid::Uuid;

use voice_lecturer_lib::models::AssetType;
use voice_lecturer_lib::models::JobType;

use super::test_helpers::*;

#[actix_rt::test]
async fn test_health_and_ready_probes() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;

    let (status, body) = api_get(&app, "/health", None).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());

    let (status, body) = api_get(&app, "/ready", None).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["database"], "connected");
}

#[actix_rt::test]
async fn test_worker_ping_reports_stores() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;

    let (status, body) = api_get(&app, "/api/worker/ping", None).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["storage"], "connected");
}

#[actix_rt::test]
async fn test_worker_status_counts_active_jobs() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (_, user_id) = register_and_login(&app).await;

    let (status, before) = api_get(&app, "/api/worker/status", None).await;
    assert_eq!(status, 200, "{}", before);
    assert!(before["pending"].is_u64());
    assert!(before["processing"].is_u64());

    let asset = seed_ready_asset(&env.pool, user_id, AssetType::VoiceSample).await;
    seed_pending_job(
        &env.pool,
        user_id,
        JobType::TextToSpeech,
        json!({ "text": "Hi", "voice_asset_id": asset.id }),
    )
    .await;

    let (status, after) = api_get(&app, "/api/worker/status", None).await;
    assert_eq!(status, 200);
    assert!(after["pending"].as_u64().unwrap() >= 1);
}

#[actix_rt::test]
async fn test_worker_task_state_transitions() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (_, user_id) = register_and_login(&app).await;

    // Unknown ids read as PENDING, matching the queue this replaced.
    let (status, body) = api_get(&app, &format!("/api/worker/task/{}", Uuid::now_v7()), None).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["state"], "PENDING");

    let asset = seed_ready_asset(&env.pool, user_id, AssetType::VoiceSample).await;
    let job = seed_pending_job(
        &env.pool,
        user_id,
        JobType::TextToSpeech,
        json!({ "text": "Hi", "voice_asset_id": asset.id }),
    )
    .await;

    let task_id = Uuid::now_v7();
    assert!(env.pool.claim_job(job.id, task_id).await.unwrap());
    env.pool
        .update_job_progress(job.id, 33, Some("Synthesizing"))
        .await
        .unwrap();

    let (status, body) = api_get(&app, &format!("/api/worker/task/{}", task_id), None).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["state"], "PROGRESS");
    assert_eq!(body["progress"], 33);
    assert_eq!(body["status"], "Synthesizing");

    assert!(env
        .pool
        .complete_job(job.id, json!({ "generated_audio_id": Uuid::now_v7() }))
        .await
        .unwrap());

    let (status, body) = api_get(&app, &format!("/api/worker/task/{}", task_id), None).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["state"], "SUCCESS");
    assert!(body["result"]["generated_audio_id"].is_string());
}

#[actix_rt::test]
async fn test_analytics_dashboard_for_fresh_user() {
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
        json!({ "text": "Hi", "voice_asset_id": asset.id }),
    )
    .await;
    assert!(env.pool.claim_job(job.id, Uuid::now_v7()).await.unwrap());
    assert!(env.pool.complete_job(job.id, json!({})).await.unwrap());

    let (status, body) = api_get(&app, "/api/analytics/dashboard", Some(&token)).await;
    assert_eq!(status, 200, "{}", body);

    assert_eq!(body["summary"]["total_jobs"], 1);
    assert_eq!(body["summary"]["completed_jobs"], 1);
    assert_eq!(body["summary"]["failed_jobs"], 0);
    assert_eq!(body["summary"]["success_rate"], 100.0);
    assert_eq!(body["status_breakdown"]["completed"], 1);

    let table = body["job_performance_table"].as_array().expect("table");
    assert_eq!(table.len(), 1);
    assert_eq!(table[0]["id"], job.id.to_string());
    assert_eq!(table[0]["status"], "completed");

    let daily = body["daily_performance"].as_array().expect("daily");
    assert_eq!(daily.len(), 30, "trailing 30 days with zero fill");
    assert_eq!(daily[0]["total_jobs"], 1, "today is the newest entry");

    let recent = body["recent_jobs"].as_array().expect("recent");
    assert_eq!(recent.len(), 1);
    assert_eq!(body["time_range"], "all");
}

#[actix_rt::test]
async fn test_analytics_rejects_unknown_time_range() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, _) = register_and_login(&app).await;

    let (status, body) = api_get(
        &app,
        "/api/analytics/dashboard?time_range=2w",
        Some(&token),
    )
    .await;
    assert_eq!(status, 400, "{}", body);
    assert_eq!(body["error"], "INVALID_INPUT");
}

#[actix_rt::test]
async fn test_export_video_requires_generated_ready_asset() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, user_id) = register_and_login(&app).await;

    // A voice sample is not exportable as video.
    let sample = seed_ready_asset(&env.pool, user_id, AssetType::VoiceSample).await;
    let (status, body) = api_get(
        &app,
        &format!("/api/export/video/{}/mp4", sample.id),
        Some(&token),
    )
    .await;
    assert_eq!(status, 400, "{}", body);

    // A ready generated video presigns fine.
    let video = seed_ready_asset(&env.pool, user_id, AssetType::GeneratedVideo).await;
    let (status, body) = api_get(
        &app,
        &format!("/api/export/video/{}/mp4", video.id),
        Some(&token),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    assert!(body["download_url"].is_string());
    assert_eq!(body["expires_in"], 3600);

    // Only mp4 is available.
    let (status, _) = api_get(
        &app,
        &format!("/api/export/video/{}/avi", video.id),
        Some(&token),
    )
    .await;
    assert_eq!(status, 400);

    // SCORM packaging is not wired up.
    let (status, _) = api_post(
        &app,
        &format!("/api/export/scorm/{}", video.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 501);
}
