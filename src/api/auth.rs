//! Authentication and account endpoints.

use actix_web::{get, post, put, web, HttpResponse};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{
    access_token_ttl, hash_password, issue_token_pair, verify_password, AuthUser,
};
use crate::config::Config;
use crate::db::users::ProfileChanges;
use crate::db::{refresh_tokens, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::user::{validate_email, validate_name, validate_password, validate_username};
use crate::models::{
    AccessTokenResponse, ChangePasswordRequest, LoginRequest, RefreshRequest, RegisterRequest,
    TokenPairResponse, UpdateProfileRequest, UserResponse, UserRole, VerifyTokenResponse,
};

/// Simple acknowledgment body.
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Configure auth routes under /api/auth.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(register)
            .service(login)
            .service(refresh)
            .service(logout)
            .service(get_profile)
            .service(update_profile)
            .service(change_password)
            .service(verify_token),
    );
}

fn validate_registration(req: &RegisterRequest) -> AppResult<()> {
    validate_email(&req.email).map_err(AppError::InvalidInput)?;
    validate_username(&req.username).map_err(AppError::InvalidInput)?;
    validate_password(&req.password).map_err(AppError::InvalidInput)?;
    if req.password != req.confirm_password {
        return Err(AppError::InvalidInput("Passwords do not match".to_string()));
    }
    validate_name(&req.first_name, "First name").map_err(AppError::InvalidInput)?;
    validate_name(&req.last_name, "Last name").map_err(AppError::InvalidInput)?;
    Ok(())
}

/// Register a new account.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = TokenPairResponse),
        (status = 400, description = "Validation failed", body = crate::error::ErrorResponse),
        (status = 409, description = "Email or username already in use", body = crate::error::ErrorResponse)
    )
)]
#[post("/register")]
pub async fn register(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    body: web::Json<RegisterRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    validate_registration(&req)?;

    if pool.user_exists(&req.email, &req.username).await? {
        return Err(AppError::Conflict(
            "An account with this email or username already exists".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password);
    let user = pool
        .insert_user(
            Uuid::now_v7(),
            &req.email,
            &req.username,
            &password_hash,
            &req.first_name,
            &req.last_name,
            req.department.as_deref(),
            req.title.as_deref(),
            req.role.unwrap_or(UserRole::Faculty),
        )
        .await?;

    info!(user_id = %user.id, username = %user.username, "User registered");

    let ttl = config.jwt.access_token_ttl_secs;
    let tokens = issue_token_pair(&pool, &config.jwt, &user, ttl).await?;
    Ok(HttpResponse::Created().json(tokens))
}

/// Log in with email and password.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair", body = TokenPairResponse),
        (status = 401, description = "Bad credentials", body = crate::error::ErrorResponse),
        (status = 403, description = "Account deactivated", body = crate::error::ErrorResponse)
    )
)]
#[post("/login")]
pub async fn login(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();

    let user = pool
        .get_user_by_email(&req.email)
        .await?
        .filter(|u| verify_password(&req.password, &u.password_hash))
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

    if !user.is_active {
        return Err(AppError::Forbidden("Account is deactivated".to_string()));
    }

    pool.update_last_login(user.id).await?;
    info!(user_id = %user.id, remember_me = req.remember_me, "User logged in");

    let ttl = access_token_ttl(&config.jwt, req.remember_me);
    let tokens = issue_token_pair(&pool, &config.jwt, &user, ttl).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// Exchange a refresh token for a new token pair.
///
/// Rotation: the presented token is revoked even though it was still valid,
/// so a replayed token fails with 401.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = AccessTokenResponse),
        (status = 401, description = "Invalid or expired refresh token", body = crate::error::ErrorResponse)
    )
)]
#[post("/refresh")]
pub async fn refresh(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    body: web::Json<RefreshRequest>,
) -> AppResult<HttpResponse> {
    let hash = refresh_tokens::hash_token(&body.refresh_token);

    let stored = refresh_tokens::find_valid_by_hash(pool.connection(), &hash)
        .await?
        .ok_or_else(|| {
            AppError::Unauthorized("Invalid or expired refresh token".to_string())
        })?;

    let user = pool
        .get_user_by_id(stored)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired refresh token".to_string()))?;
    if !user.is_active {
        return Err(AppError::Forbidden("Account is deactivated".to_string()));
    }

    refresh_tokens::revoke_by_hash(pool.connection(), &hash).await?;

    let ttl = config.jwt.access_token_ttl_secs;
    let tokens = issue_token_pair(&pool, &config.jwt, &user, ttl).await?;
    Ok(HttpResponse::Ok().json(AccessTokenResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
    }))
}

/// Revoke a refresh token.
///
/// Always returns 200; revoking an unknown token is a no-op.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Logged out", body = MessageResponse)
    )
)]
#[post("/logout")]
pub async fn logout(
    pool: web::Data<DbPool>,
    body: web::Json<RefreshRequest>,
) -> AppResult<HttpResponse> {
    let hash = refresh_tokens::hash_token(&body.refresh_token);
    refresh_tokens::revoke_by_hash(pool.connection(), &hash).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Logged out successfully".to_string(),
    }))
}

/// Get the current user's profile.
#[utoipa::path(
    get,
    path = "/api/auth/profile",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
#[get("/profile")]
pub async fn get_profile(pool: web::Data<DbPool>, auth: AuthUser) -> AppResult<HttpResponse> {
    let user = pool
        .get_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// Update the current user's profile.
#[utoipa::path(
    put,
    path = "/api/auth/profile",
    tag = "Auth",
    security(("bearer_auth" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Validation failed", body = crate::error::ErrorResponse)
    )
)]
#[put("/profile")]
pub async fn update_profile(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<UpdateProfileRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();

    if let Some(ref first_name) = req.first_name {
        validate_name(first_name, "First name").map_err(AppError::InvalidInput)?;
    }
    if let Some(ref last_name) = req.last_name {
        validate_name(last_name, "Last name").map_err(AppError::InvalidInput)?;
    }

    let user = pool
        .update_user_profile(
            auth.user_id,
            ProfileChanges {
                first_name: req.first_name,
                last_name: req.last_name,
                department: req.department,
                title: req.title,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// Change the current user's password.
///
/// All refresh tokens are revoked so other sessions must log in again.
#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    tag = "Auth",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Wrong current password or weak new password", body = crate::error::ErrorResponse)
    )
)]
#[post("/change-password")]
pub async fn change_password(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<ChangePasswordRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();

    let user = pool
        .get_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(AppError::InvalidInput(
            "Current password is incorrect".to_string(),
        ));
    }
    validate_password(&req.new_password).map_err(AppError::InvalidInput)?;
    if req.new_password != req.confirm_new_password {
        return Err(AppError::InvalidInput(
            "New passwords do not match".to_string(),
        ));
    }

    let password_hash = hash_password(&req.new_password);
    pool.update_user_password(user.id, &password_hash).await?;

    let revoked = refresh_tokens::revoke_all_for_user(pool.connection(), user.id).await?;
    info!(user_id = %user.id, revoked, "Password changed, sessions revoked");

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Password changed successfully".to_string(),
    }))
}

/// Verify an access token and return the account it belongs to.
#[utoipa::path(
    post,
    path = "/api/auth/verify-token",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Token is valid", body = VerifyTokenResponse),
        (status = 401, description = "Invalid token or deactivated account", body = crate::error::ErrorResponse)
    )
)]
#[post("/verify-token")]
pub async fn verify_token(pool: web::Data<DbPool>, auth: AuthUser) -> AppResult<HttpResponse> {
    let user = pool
        .get_user_by_id(auth.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    Ok(HttpResponse::Ok().json(VerifyTokenResponse {
        valid: true,
        user: UserResponse::from(user),
    }))
}
