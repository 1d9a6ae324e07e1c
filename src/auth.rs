use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::AppState;
use axum::{
    extract::{Path, Request, State},
    http::header,
    middleware::Next,
    response::Response,
    Extension,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT payload. The username is the only identity claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub iat: usize,
    pub exp: usize,
}

/// Identity attached to a request by [`auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub username: String,
}

// bcrypt is CPU-bound; keep it off the async workers.
pub async fn hash_password(password: String, cost: u32) -> AppResult<String> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
}

pub async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??)
}

pub fn create_token(config: &Config, username: &str) -> AppResult<String> {
    let now = Utc::now().timestamp();
    let expires = now
        .checked_add(config.token_ttl)
        .and_then(|exp| usize::try_from(exp).ok())
        .ok_or_else(|| AppError::Internal(format!("token ttl out of range: {}", config.token_ttl)))?;
    let claims = Claims {
        username: username.to_string(),
        iat: usize::try_from(now).map_err(|_| AppError::Internal("clock before epoch".into()))?,
        exp: expires,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret_key.as_bytes()),
    )?;

    Ok(token)
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// Middleware to validate the bearer token
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request).ok_or_else(AppError::unauthorized)?;

    let claims = verify_token(&state.config.secret_key, token).map_err(|e| {
        tracing::debug!("rejected token: {}", e);
        AppError::unauthorized()
    })?;

    request.extensions_mut().insert(AuthUser {
        username: claims.username,
    });
    Ok(next.run(request).await)
}

/// Only lets the request through when the caller is the `:username` in the path.
/// Must sit inside [`auth_middleware`].
pub async fn ensure_correct_user(
    Extension(user): Extension<AuthUser>,
    Path(username): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if user.username != username {
        return Err(AppError::unauthorized());
    }
    Ok(next.run(request).await)
}
