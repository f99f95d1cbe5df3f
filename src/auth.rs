use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::User,
};

/// Header accepted as the caller's username when running in `Env::Local`.
pub const USERNAME_HEADER: &str = "x-username";

/// Claims
///
/// Payload of a session token issued by `POST /auth/login`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): id of the user in the `users` table.
    pub sub: i64,
    /// Username at issue time. Informational; authorization always re-reads the user.
    pub username: String,
    /// Expiration Time (exp).
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// CallerIdentity
///
/// Who the request claims to come from, before any store lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerIdentity {
    /// From a validated session token.
    UserId(i64),
    /// From the local development bypass header.
    Username(String),
}

/// Caller
///
/// Extractor for the authenticated caller. It only establishes *who* is calling
/// (token signature and expiry, or the local bypass); whether that user still
/// exists and what their role allows is decided by `authz::authorize`.
///
/// Rejection: `ApiError::Unauthorized` (401) when no valid credential is present.
#[derive(Debug, Clone)]
pub struct Caller {
    pub identity: CallerIdentity,
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        // Local bypass: the caller names itself by username. Ignored in production.
        if config.env == Env::Local {
            if let Some(username) = parts
                .headers
                .get(USERNAME_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
            {
                return Ok(Caller {
                    identity: CallerIdentity::Username(username.to_string()),
                });
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        let claims = decode_token(token, &config.jwt_secret)?;

        Ok(Caller {
            identity: CallerIdentity::UserId(claims.sub),
        })
    }
}

/// Validates signature and expiry and returns the claims.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => ApiError::Unauthorized("Token expired".to_string()),
            _ => ApiError::Unauthorized("Invalid token".to_string()),
        })
}

/// issue_token
///
/// Signs a session token for `user`, valid for `config.jwt_ttl_secs`. Returns the
/// token and its expiry as a Unix timestamp.
pub fn issue_token(config: &AppConfig, user: &User) -> Result<(String, u64), ApiError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| ApiError::Internal(format!("system clock before epoch: {}", e)))?
        .as_secs();
    let expires_at = now + config.jwt_ttl_secs;

    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        iat: now as usize,
        exp: expires_at as usize,
    };

    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    let token = encode(&Header::default(), &claims, &key)
        .map_err(|e| ApiError::Internal(format!("token signing failed: {}", e)))?;
    Ok((token, expires_at))
}
