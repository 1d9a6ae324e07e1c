//! `/users` routes. Everything under `/users/:username` is gated by
//! `ensure_correct_user` before it reaches these handlers.

use crate::error::AppResult;
use crate::models::{MessagesEnvelope, ReceivedMessage, SentMessage, UserEnvelope, UsersEnvelope};
use crate::users;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};

pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<UsersEnvelope>> {
    let users = users::list_all(&state.pool).await?;
    Ok(Json(UsersEnvelope { users }))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<UserEnvelope>> {
    let user = users::get_by_username(&state.pool, &username).await?;
    Ok(Json(UserEnvelope { user }))
}

pub async fn messages_to(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<MessagesEnvelope<ReceivedMessage>>> {
    let messages = users::messages_to(&state.pool, &username).await?;
    Ok(Json(MessagesEnvelope { messages }))
}

pub async fn messages_from(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<MessagesEnvelope<SentMessage>>> {
    let messages = users::messages_from(&state.pool, &username).await?;
    Ok(Json(MessagesEnvelope { messages }))
}
