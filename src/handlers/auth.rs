use crate::auth::{create_token, hash_password};
use crate::error::{AppError, AppResult};
use crate::models::{required, JsonBody, LoginRequest, NewUser, RegisterRequest, TokenResponse};
use crate::users;
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};

/// POST /login: `{username, password}` => `{token}`, and bumps the last-login time.
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let (Some(username), Some(password)) = (required(payload.username), required(payload.password))
    else {
        return Err(AppError::missing_inputs());
    };

    // Unknown user and wrong password look the same from outside, in body and in timing.
    match users::authenticate(&state.pool, &username, &password).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(username = %username, "failed login");
            return Err(AppError::invalid_credentials());
        }
        Err(AppError::NotFound(_)) => {
            // Spend one bcrypt round at the configured cost, as a real verify would.
            hash_password(password, state.config.bcrypt_cost).await?;
            tracing::warn!(username = %username, "failed login");
            return Err(AppError::invalid_credentials());
        }
        Err(e) => return Err(e),
    }

    users::touch_login(&state.pool, &username).await?;
    let token = create_token(&state.config, &username)?;
    tracing::info!(username = %username, "logged in");

    Ok(Json(TokenResponse { token }))
}

/// POST /register: all five profile fields => `{token}` with 201.
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> AppResult<(StatusCode, Json<TokenResponse>)> {
    let (Some(username), Some(password), Some(first_name), Some(last_name), Some(phone)) = (
        required(payload.username),
        required(payload.password),
        required(payload.first_name),
        required(payload.last_name),
        required(payload.phone),
    ) else {
        return Err(AppError::missing_inputs());
    };

    let user = users::register(
        &state.pool,
        NewUser {
            username,
            password,
            first_name,
            last_name,
            phone,
        },
        state.config.bcrypt_cost,
    )
    .await?;

    let token = create_token(&state.config, &user.username)?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}
