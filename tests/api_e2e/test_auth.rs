//! E2E tests: registration, login, and session management.

use serde_json::json;

use super::test_helpers::*;

#[actix_rt::test]
async fn test_register_returns_tokens_and_user() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;

    let suffix = unique_suffix();
    let (status, body) = register_user(&app, &suffix).await;

    assert_eq!(status, 201, "{}", body);
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
    assert_eq!(body["user"]["role"], "faculty");
    assert_eq!(
        body["user"]["email"],
        format!("lecturer_{}@example.edu", suffix)
    );
    assert_eq!(body["expires_in"], 3600);
}

#[actix_rt::test]
async fn test_register_duplicate_email_conflicts() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;

    let suffix = unique_suffix();
    let (first, _) = register_user(&app, &suffix).await;
    assert_eq!(first, 201);

    let (second, body) = register_user(&app, &suffix).await;
    assert_eq!(second, 409, "{}", body);
    assert_eq!(body["error"], "CONFLICT");
}

#[actix_rt::test]
async fn test_register_rejects_weak_password() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;

    let suffix = unique_suffix();
    let (status, body) = api_post(
        &app,
        "/api/auth/register",
        None,
        Some(json!({
            "email": format!("weak_{}@example.edu", suffix),
            "username": format!("weak_{}", suffix),
            "password": "alllowercase1",
            "confirm_password": "alllowercase1",
            "first_name": "Weak",
            "last_name": "Password",
        })),
    )
    .await;

    assert_eq!(status, 400, "{}", body);
    assert_eq!(body["error"], "INVALID_INPUT");
}

#[actix_rt::test]
async fn test_login_and_profile() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;

    let suffix = unique_suffix();
    let (status, _) = register_user(&app, &suffix).await;
    assert_eq!(status, 201);

    let (status, body) = api_post(
        &app,
        "/api/auth/login",
        None,
        Some(json!({
            "email": format!("lecturer_{}@example.edu", suffix),
            "password": TEST_PASSWORD,
        })),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    let token = body["access_token"].as_str().expect("access_token");

    let (status, profile) = api_get(&app, "/api/auth/profile", Some(token)).await;
    assert_eq!(status, 200, "{}", profile);
    assert_eq!(profile["username"], format!("lecturer_{}", suffix));
}

#[actix_rt::test]
async fn test_login_wrong_password_unauthorized() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;

    let suffix = unique_suffix();
    let (status, _) = register_user(&app, &suffix).await;
    assert_eq!(status, 201);

    let (status, body) = api_post(
        &app,
        "/api/auth/login",
        None,
        Some(json!({
            "email": format!("lecturer_{}@example.edu", suffix),
            "password": "WrongPass1",
        })),
    )
    .await;
    assert_eq!(status, 401, "{}", body);
    assert_eq!(body["error"], "UNAUTHORIZED");
}

#[actix_rt::test]
async fn test_profile_requires_token() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;

    let (status, body) = api_get(&app, "/api/auth/profile", None).await;
    assert_eq!(status, 401, "{}", body);

    let (status, _) = api_get(&app, "/api/auth/profile", Some("not-a-jwt")).await;
    assert_eq!(status, 401);
}

#[actix_rt::test]
async fn test_refresh_rotates_tokens() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;

    let suffix = unique_suffix();
    let (status, body) = register_user(&app, &suffix).await;
    assert_eq!(status, 201);
    let refresh = body["refresh_token"].as_str().expect("refresh_token");

    let (status, rotated) = api_post(
        &app,
        "/api/auth/refresh",
        None,
        Some(json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(status, 200, "{}", rotated);
    assert!(rotated["access_token"].is_string());
    assert!(rotated["refresh_token"].is_string());

    // The presented token was revoked during rotation; replaying it fails.
    let (status, replayed) = api_post(
        &app,
        "/api/auth/refresh",
        None,
        Some(json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(status, 401, "{}", replayed);
}

#[actix_rt::test]
async fn test_change_password_revokes_sessions() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;

    let suffix = unique_suffix();
    let (status, body) = register_user(&app, &suffix).await;
    assert_eq!(status, 201);
    let token = body["access_token"].as_str().expect("access_token");
    let refresh = body["refresh_token"].as_str().expect("refresh_token");

    let (status, changed) = api_post(
        &app,
        "/api/auth/change-password",
        Some(token),
        Some(json!({
            "current_password": TEST_PASSWORD,
            "new_password": "NewPassw0rd9",
            "confirm_new_password": "NewPassw0rd9",
        })),
    )
    .await;
    assert_eq!(status, 200, "{}", changed);

    // Old refresh tokens no longer work.
    let (status, _) = api_post(
        &app,
        "/api/auth/refresh",
        None,
        Some(json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(status, 401);

    // Login works with the new password only.
    let (status, _) = api_post(
        &app,
        "/api/auth/login",
        None,
        Some(json!({
            "email": format!("lecturer_{}@example.edu", suffix),
            "password": "NewPassw0rd9",
        })),
    )
    .await;
    assert_eq!(status, 200);
}

#[actix_rt::test]
async fn test_verify_token_reports_account() {
    let Some(env) = TestEnv::init().await else {
        return;
    };
    let app = env.app().await;

    let (token, user_id) = register_and_login(&app).await;

    let (status, body) = api_post(&app, "/api/auth/verify-token", Some(&token), None).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["valid"], true);
    assert_eq!(body["user"]["id"], user_id.to_string());
}
