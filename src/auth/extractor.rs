//! Actix-web extractor for JWT bearer authentication.

use actix_web::dev::Payload;
use actix_web::http::StatusCode;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse, ResponseError};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::config::Config;
use crate::error::ErrorResponse;
use crate::models::UserRole;

use super::verify_access_token;

/// Pull the token out of an `Authorization: Bearer <token>` header.
/// Returns None if the header is missing or malformed.
fn extract_bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authentication error for extractors.
#[derive(Debug)]
pub struct AuthError {
    message: String,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ResponseError for AuthError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::UNAUTHORIZED).json(ErrorResponse {
            error: "UNAUTHORIZED".to_string(),
            message: self.message.clone(),
        })
    }
}

/// Extractor that requires a valid access token.
///
/// Use this in handlers that require authentication:
/// ```ignore
/// async fn protected_handler(auth: AuthUser) -> impl Responder {
///     // auth.user_id identifies the caller
/// }
/// ```
///
/// Token validation is purely cryptographic; no database round trip per
/// request. Account deactivation takes effect when the access token expires
/// or the client hits an endpoint that reloads the user row.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
}

impl FromRequest for AuthUser {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let config = match req.app_data::<web::Data<Config>>() {
            Some(config) => config,
            None => {
                return ready(Err(AuthError {
                    message: "Internal configuration error".to_string(),
                }));
            }
        };

        let token = match extract_bearer_token(req) {
            Some(token) => token,
            None => {
                return ready(Err(AuthError {
                    message: "Missing bearer token. Provide an Authorization header.".to_string(),
                }));
            }
        };

        match verify_access_token(token, &config.jwt) {
            Ok(claims) => {
                let role = match UserRole::parse(&claims.role) {
                    Some(role) => role,
                    None => {
                        return ready(Err(AuthError {
                            message: "Invalid or expired token".to_string(),
                        }));
                    }
                };
                ready(Ok(AuthUser {
                    user_id: claims.user_id,
                    username: claims.username,
                    role,
                }))
            }
            Err(e) => ready(Err(AuthError {
                message: e.to_string(),
            })),
        }
    }
}
