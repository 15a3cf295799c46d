//! Authentication module: JWT session tokens and password hashing.
//!
//! Access tokens are short-lived HS256 JWTs signed with the configured
//! secret. Refresh tokens are opaque random strings stored hashed; see
//! [`crate::db::refresh_tokens`].

mod extractor;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;

pub use extractor::AuthUser;

use crate::config::JwtSettings;
use crate::db::{refresh_tokens, DbPool};
use crate::entity::user;
use crate::error::{AppError, AppResult};
use crate::models::{SessionClaims, TokenPairResponse, UserResponse};

/// Issuer claim stamped into every access token.
pub const TOKEN_ISSUER: &str = "vcl";

/// Extended access-token lifetime for remember-me logins.
const REMEMBER_ME_TTL_SECS: i64 = 7 * 24 * 3600;

/// Hash a password for storage (argon2id via password-auth).
pub fn hash_password(password: &str) -> String {
    password_auth::generate_hash(password)
}

/// Verify a password against a stored hash.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    password_auth::verify_password(password, password_hash).is_ok()
}

/// Create a signed access token for a user.
pub fn create_access_token(
    user: &user::Model,
    jwt: &JwtSettings,
    ttl_secs: i64,
) -> AppResult<String> {
    let now = Utc::now().timestamp();
    let claims = SessionClaims {
        sub: user.id.to_string(),
        iss: TOKEN_ISSUER.to_string(),
        exp: now + ttl_secs,
        iat: now,
        user_id: user.id,
        username: user.username.clone(),
        role: user.role.clone(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt.secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign access token: {}", e)))?;

    Ok(token)
}

/// Decode and validate an access token.
pub fn verify_access_token(token: &str, jwt: &JwtSettings) -> AppResult<SessionClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.validate_aud = false;

    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(jwt.secret.expose_secret().as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    Ok(data.claims)
}

/// Access-token lifetime for a login, honoring remember-me.
pub fn access_token_ttl(jwt: &JwtSettings, remember_me: bool) -> i64 {
    if remember_me {
        REMEMBER_ME_TTL_SECS
    } else {
        jwt.access_token_ttl_secs
    }
}

/// Issue a fresh access + refresh token pair for a user.
///
/// The refresh token is stored hashed with the configured TTL.
pub async fn issue_token_pair(
    pool: &DbPool,
    jwt: &JwtSettings,
    user: &user::Model,
    ttl_secs: i64,
) -> AppResult<TokenPairResponse> {
    let access_token = create_access_token(user, jwt, ttl_secs)?;

    let refresh_token = refresh_tokens::generate_token();
    let refresh_ttl_secs = (jwt.refresh_token_ttl_days * 24 * 3600) as u64;
    refresh_tokens::insert(
        pool.connection(),
        user.id,
        &refresh_tokens::hash_token(&refresh_token),
        refresh_ttl_secs,
    )
    .await?;

    Ok(TokenPairResponse {
        access_token,
        refresh_token,
        user: UserResponse::from(user.clone()),
        expires_in: ttl_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn test_jwt_settings() -> JwtSettings {
        JwtSettings {
            secret: SecretString::from("unit-test-signing-secret"),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_days: 30,
        }
    }

    fn test_user() -> user::Model {
        let now = Utc::now();
        user::Model {
            id: uuid::Uuid::new_v4(),
            email: "ada@example.edu".to_string(),
            username: "ada".to_string(),
            password_hash: "unused".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            department: None,
            title: None,
            role: "faculty".to_string(),
            is_active: true,
            is_verified: false,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let jwt = test_jwt_settings();
        let user = test_user();

        let token = create_access_token(&user, &jwt, 3600).unwrap();
        let claims = verify_access_token(&token, &jwt).unwrap();

        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.username, "ada");
        assert_eq!(claims.role, "faculty");
        assert_eq!(claims.iss, TOKEN_ISSUER);
        assert_eq!(claims.sub, user.id.to_string());
    }

    #[test]
    fn test_token_rejected_with_wrong_secret() {
        let jwt = test_jwt_settings();
        let user = test_user();
        let token = create_access_token(&user, &jwt, 3600).unwrap();

        let other = JwtSettings {
            secret: SecretString::from("a-different-secret"),
            ..test_jwt_settings()
        };
        assert!(verify_access_token(&token, &other).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let jwt = test_jwt_settings();
        let user = test_user();

        // Already expired, outside the default leeway
        let token = create_access_token(&user, &jwt, -600).unwrap();
        assert!(verify_access_token(&token, &jwt).is_err());
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("Secur3Pass");
        assert_ne!(hash, "Secur3Pass");
        assert!(verify_password("Secur3Pass", &hash));
        assert!(!verify_password("WrongPass1", &hash));
    }

    #[test]
    fn test_remember_me_extends_ttl() {
        let jwt = test_jwt_settings();
        assert_eq!(access_token_ttl(&jwt, false), 3600);
        assert_eq!(access_token_ttl(&jwt, true), REMEMBER_ME_TTL_SECS);
    }
}
