//! E2E tests: asset upload, listing, presigned access, deletion.

use actix_web::dev::ServiceResponse;
use actix_web::test;
use serde_json::{json, Value};

use voice_lecturer_lib::models::AssetType;

use super::test_helpers::*;

const BOUNDARY: &str = "vcl-e2e-boundary";

/// Build a multipart upload body with `file` and `asset_type` fields.
fn multipart_body(filename: &str, content_type: &str, data: &[u8], asset_type: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            BOUNDARY, filename, content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(
        format!(
            "\r\n--{}\r\nContent-Disposition: form-data; name=\"asset_type\"\r\n\r\n{}\r\n--{}--\r\n",
            BOUNDARY, asset_type, BOUNDARY
        )
        .as_bytes(),
    );
    body
}

async fn upload_file<S>(
    app: &S,
    token: &str,
    filename: &str,
    content_type: &str,
    data: &[u8],
    asset_type: &str,
) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = test::TestRequest::post()
        .uri("/api/assets/upload")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(multipart_body(filename, content_type, data, asset_type))
        .to_request();

    let resp = test::call_service(app, req).await;
    let status = resp.status().as_u16();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

#[actix_rt::test]
async fn test_upload_download_delete_roundtrip() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, _) = register_and_login(&app).await;

    let (status, body) = upload_file(
        &app,
        &token,
        "narration.wav",
        "audio/wav",
        b"RIFF0000WAVEfmt fake-samples",
        "voice_sample",
    )
    .await;
    assert_eq!(status, 201, "{}", body);
    assert_eq!(body["asset"]["status"], "ready");
    assert_eq!(body["asset"]["asset_type"], "voice_sample");
    assert!(body["asset"]["download_url"].is_string());
    let asset_id = body["asset"]["id"].as_str().expect("asset id").to_string();

    let (status, detail) = api_get(&app, &format!("/api/assets/{}", asset_id), Some(&token)).await;
    assert_eq!(status, 200, "{}", detail);
    assert_eq!(detail["original_filename"], "narration.wav");

    let (status, download) = api_get(
        &app,
        &format!("/api/assets/{}/download", asset_id),
        Some(&token),
    )
    .await;
    assert_eq!(status, 200, "{}", download);
    assert!(download["download_url"].is_string());
    assert_eq!(download["filename"], "narration.wav");

    let (status, deleted) = api_delete(&app, &format!("/api/assets/{}", asset_id), &token).await;
    assert_eq!(status, 200, "{}", deleted);

    let (status, _) = api_get(&app, &format!("/api/assets/{}", asset_id), Some(&token)).await;
    assert_eq!(status, 404);
}

#[actix_rt::test]
async fn test_upload_rejects_wrong_extension() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, _) = register_and_login(&app).await;

    let (status, body) = upload_file(
        &app,
        &token,
        "portrait.exe",
        "application/octet-stream",
        b"MZ",
        "portrait",
    )
    .await;
    assert_eq!(status, 400, "{}", body);
    assert_eq!(body["error"], "INVALID_INPUT");
}

#[actix_rt::test]
async fn test_upload_rejects_generated_types() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, _) = register_and_login(&app).await;

    let (status, body) = upload_file(
        &app,
        &token,
        "lecture.mp4",
        "video/mp4",
        b"fake",
        "generated_video",
    )
    .await;
    assert_eq!(status, 400, "{}", body);
}

#[actix_rt::test]
async fn test_list_assets_scoped_to_owner() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;

    let (owner_token, owner_id) = register_and_login(&app).await;
    let (other_token, _) = register_and_login(&app).await;

    let asset = seed_ready_asset(&env.pool, owner_id, AssetType::VoiceSample).await;

    let (status, listed) = api_get(&app, "/api/assets", Some(&owner_token)).await;
    assert_eq!(status, 200, "{}", listed);
    assert_eq!(listed["pagination"]["total"], 1);
    assert_eq!(listed["assets"][0]["id"], asset.id.to_string());

    // A fresh user sees an empty list and cannot read the asset directly.
    let (status, empty) = api_get(&app, "/api/assets", Some(&other_token)).await;
    assert_eq!(status, 200);
    assert_eq!(empty["pagination"]["total"], 0);

    let (status, body) = api_get(
        &app,
        &format!("/api/assets/{}", asset.id),
        Some(&other_token),
    )
    .await;
    assert_eq!(status, 404, "{}", body);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[actix_rt::test]
async fn test_presigned_upload_flow_requires_object() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;
    let (token, _) = register_and_login(&app).await;

    let (status, body) = api_post(
        &app,
        "/api/assets/presigned-upload",
        Some(&token),
        Some(json!({
            "filename": "voice.wav",
            "asset_type": "voice_sample",
            "file_size": 2048,
        })),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    assert!(body["upload_url"].is_string());
    assert_eq!(body["method"], "PUT");
    let asset_id = body["asset_id"].as_str().expect("asset_id");

    // Nothing was actually uploaded, so confirmation must refuse to flip
    // the asset to ready.
    let (status, confirm) = api_post(
        &app,
        &format!("/api/assets/{}/confirm-upload", asset_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 400, "{}", confirm);

    let (status, detail) = api_get(&app, &format!("/api/assets/{}", asset_id), Some(&token)).await;
    assert_eq!(status, 200);
    assert_eq!(detail["status"], "uploading");
}
